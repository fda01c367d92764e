//! Port layer - the primitive thread runtime the OSEK layer runs on
//!
//! The kernel never switches contexts itself. It tells the substrate which
//! thread to resume or suspend through the [`Port`] trait, and asks it who
//! is executing right now. Priorities handed to the substrate use its own
//! scale, where 0 is the most urgent level.

use crate::error::FatalError;
use crate::types::ThreadId;

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
use cortex_m4 as arch;

#[cfg(not(target_arch = "arm"))]
pub mod sim;

#[cfg(not(target_arch = "arm"))]
pub use sim::{PortEvent, SimPort};

/// Entry point of a task or ISR body
pub type ThreadEntry = fn();

/// Failure reported by the substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortError {
    /// No such thread
    InvalidThread,
    /// Thread is in the wrong state for the operation
    InvalidState,
    /// Substrate could not allocate the thread
    NoMemory,
}

/// Primitive runtime consumed by the kernel
///
/// Thread operations may fail during initialization, which the kernel turns
/// into a service error. A failure during the run phase is fatal.
pub trait Port {
    /// Create a thread in the suspended state, positioned at `entry`
    ///
    /// # Arguments
    /// * `thread` - Pool slot the thread is bound to
    /// * `entry` - Body of the task or ISR
    /// * `priority` - Substrate priority (0 = highest)
    /// * `stack_size` - Stack size in bytes, padding included
    fn thread_create(
        &mut self,
        thread: ThreadId,
        entry: ThreadEntry,
        priority: u8,
        stack_size: usize,
    ) -> Result<(), PortError>;

    /// Let a suspended thread run
    fn thread_resume(&mut self, thread: ThreadId) -> Result<(), PortError>;

    /// Stop a thread where it is
    fn thread_suspend(&mut self, thread: ThreadId) -> Result<(), PortError>;

    /// Stop a thread for good
    fn thread_terminate(&mut self, thread: ThreadId) -> Result<(), PortError>;

    /// Rewind a terminated thread to its entry point
    fn thread_reset(&mut self, thread: ThreadId) -> Result<(), PortError>;

    /// Release a terminated thread
    fn thread_delete(&mut self, thread: ThreadId) -> Result<(), PortError>;

    /// Set the substrate preemption threshold of a thread
    fn preemption_change(&mut self, thread: ThreadId, threshold: u8) -> Result<(), PortError>;

    /// Thread executing on the CPU, if it is an OSEK thread
    fn current_thread(&self) -> Option<ThreadId>;

    /// Mask every interrupt the OS does not own
    fn interrupts_disable(&mut self) {
        #[cfg(target_arch = "arm")]
        arch::interrupts_disable();
    }

    /// Undo [`Port::interrupts_disable`]
    fn interrupts_enable(&mut self) {
        #[cfg(target_arch = "arm")]
        arch::interrupts_enable();
    }

    /// Stop the system after an unrecoverable fault
    fn fatal(&mut self, error: FatalError) -> ! {
        #[cfg(target_arch = "arm")]
        {
            arch::halt(error)
        }

        #[cfg(not(target_arch = "arm"))]
        {
            panic!("fatal OSEK error {}", error.code())
        }
    }
}
