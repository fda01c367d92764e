//! Hook routines called by the kernel at fixed transition points
//!
//! Every hook receives the kernel so it may query state or call the
//! services its execution mode permits. Hooks never nest: scheduling
//! requests they post are processed once the hook has returned.

use crate::error::ErrorInfo;
use crate::kernel::Kernel;
use crate::port::Port;
use crate::types::StatusType;

pub type HookFn<P> = fn(&mut Kernel<P>);
pub type ErrorHookFn<P> = fn(&mut Kernel<P>, ErrorInfo);
pub type ShutdownHookFn<P> = fn(&mut Kernel<P>, StatusType);

/// Registered hook routines
pub struct Hooks<P: Port> {
    /// Called for every service error detected at run time
    pub error: Option<ErrorHookFn<P>>,
    /// Called once by `start_os` before the first dispatch
    pub startup: Option<HookFn<P>>,
    pub shutdown: Option<ShutdownHookFn<P>>,
    /// Called when a task enters the RUNNING state
    pub pre_task: Option<HookFn<P>>,
    /// Called when a task leaves the RUNNING state
    pub post_task: Option<HookFn<P>>,
}

impl<P: Port> Hooks<P> {
    pub const fn new() -> Self {
        Hooks {
            error: None,
            startup: None,
            shutdown: None,
            pre_task: None,
            post_task: None,
        }
    }
}

impl<P: Port> Clone for Hooks<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: Port> Copy for Hooks<P> {}

impl<P: Port> Default for Hooks<P> {
    fn default() -> Self {
        Self::new()
    }
}
