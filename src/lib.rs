//! OSEK/VDX scheduling layer in Rust
//!
//! A compatibility layer running over a preemptive priority-based thread
//! substrate, providing:
//! - Task activation, termination and chaining with multiple activation
//! - Resources with priority ceiling (highest locker) protocol
//! - Event masks for extended tasks
//! - Counters and alarms driven by a periodic tick
//! - A single System Manager that serializes every scheduling decision

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod port;

// ============ Re-exports ============

pub use crate::core::config;
pub use crate::core::config::*;
pub use crate::core::critical;
pub use crate::core::error;
pub use crate::core::error::{ErrorInfo, FatalError, OsError, OsResult, ServiceId};
pub use crate::core::event;
pub use crate::core::hooks::Hooks;
pub use crate::core::interrupt::IsrConfig;
pub use crate::core::kernel;
pub use crate::core::kernel::{Kernel, Os};
pub use crate::core::prio;
pub use crate::core::resource;
pub use crate::core::sched;
pub use crate::core::task;
pub use crate::core::task::TaskConfig;
pub use crate::core::time;
pub use crate::core::time::{AlarmAction, AlarmConfig, AlarmStart};
pub use crate::core::types;
pub use crate::core::types::*;
pub use port::{Port, PortError};
pub use port::ThreadEntry;

#[cfg(not(target_arch = "arm"))]
pub use port::{PortEvent, SimPort};
