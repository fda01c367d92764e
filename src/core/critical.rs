//! Critical section handling
//!
//! Short interrupt-free sections around shared kernel state. The actual
//! masking comes from the `critical-section` implementation registered for
//! the target (single-core Cortex-M in `lib.rs`, `std` on hosts).

pub use critical_section::CriticalSection;

/// Execute a closure with interrupts disabled
///
/// The closure receives the critical section token, which can be used to
/// access [`CsCell`](crate::core::cs_cell::CsCell) protected data.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}
