//! Task management module
//!
//! Task creation plus the activation, termination, chaining and yield
//! services. Every service that changes who may run only validates and
//! counts at call time, then hands the queue work to the System Manager.

mod tcb;

pub use tcb::{Tcb, ThreadKind};

use crate::config::{
    OSEK_MAX_ACTIVATION, OSEK_MAX_PRIORITY, OSEK_STACK_MIN, OSEK_STACK_PADDING,
};
use crate::core::kernel::{Kernel, ACTIVATION_LEVELS};
use crate::core::sysmgr::Request;
use crate::error::{FatalError, OsError, OsResult, ServiceId};
use crate::port::{Port, ThreadEntry};
use crate::prio::substrate_priority;
use crate::types::{
    AppMode, Priority, SchedulePolicy, TaskId, TaskKind, TaskState, ThreadId, OSDEFAULTAPPMODE,
};

/// Static description of a task
///
/// # Example
/// ```ignore
/// let id = kernel.create_task(
///     TaskConfig::new("Control", control_body)
///         .priority(5)
///         .kind(TaskKind::Extended)
///         .autostart(true),
/// )?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TaskConfig {
    pub name: &'static str,
    pub entry: ThreadEntry,
    pub priority: Priority,
    pub max_activation: u8,
    pub policy: SchedulePolicy,
    pub kind: TaskKind,
    pub autostart: bool,
    pub app_mode: AppMode,
    /// Stack size in bytes, before padding
    pub stack_size: usize,
}

impl TaskConfig {
    pub const fn new(name: &'static str, entry: ThreadEntry) -> Self {
        TaskConfig {
            name,
            entry,
            priority: 0,
            max_activation: 1,
            policy: SchedulePolicy::Full,
            kind: TaskKind::Basic,
            autostart: false,
            app_mode: OSDEFAULTAPPMODE,
            stack_size: 512,
        }
    }

    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub const fn max_activation(mut self, max: u8) -> Self {
        self.max_activation = max;
        self
    }

    pub const fn policy(mut self, policy: SchedulePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn kind(mut self, kind: TaskKind) -> Self {
        self.kind = kind;
        self
    }

    pub const fn autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    pub const fn app_mode(mut self, mode: AppMode) -> Self {
        self.app_mode = mode;
        self
    }

    pub const fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }
}

impl<P: Port> Kernel<P> {
    // ============ Creation ============

    /// Create a task
    ///
    /// Initialization phase only. The backing thread is created suspended.
    ///
    /// # Returns
    /// * `Ok(TaskId)` - Handle of the new task
    /// * `Err(OsError::NameExists)` - Another task or ISR has this name
    /// * `Err(OsError::InvalidValue)` - Priority, activation limit or stack out of range
    /// * `Err(OsError::NoFreeSlot)` - Thread pool exhausted
    pub fn create_task(&mut self, config: TaskConfig) -> OsResult<TaskId> {
        self.require_init()?;

        if self.thread_named(config.name).is_some() {
            return Err(OsError::NameExists);
        }
        if config.priority > OSEK_MAX_PRIORITY
            || config.max_activation == 0
            || config.max_activation > OSEK_MAX_ACTIVATION
            || config.stack_size < OSEK_STACK_MIN
        {
            return Err(OsError::InvalidValue);
        }
        if self.tasks.is_full() {
            return Err(OsError::NoFreeSlot);
        }

        let thread = ThreadId(self.tasks.len() as u8);
        let stack_size = config.stack_size + OSEK_STACK_PADDING;
        self.port
            .thread_create(
                thread,
                config.entry,
                substrate_priority(config.priority),
                stack_size,
            )
            .map_err(|_| OsError::System)?;

        let mut tcb = Tcb::new(config.name, ThreadKind::Task, config.entry, config.priority);
        tcb.stack_size = stack_size;
        tcb.policy = config.policy;
        tcb.task_kind = config.kind;
        tcb.autostart = config.autostart;
        tcb.app_mode = config.app_mode;
        tcb.max_active = config.max_activation;
        let index = self.tasks.alloc(tcb)?;

        crate::info!("task {=str} created with id {=u8}", config.name, index);
        Ok(TaskId(index))
    }

    // ============ Activation ============

    /// Queue one more activation of a task
    ///
    /// # Returns
    /// * `Err(OsError::ActivationLimitExceeded)` - All activation slots in use, nothing queued
    /// * `Err(OsError::InvalidObject)` - Not a task handle
    /// * `Err(OsError::WrongCallContext)` - Called from a hook, an ISR1 or before start
    pub fn activate_task(&mut self, task: TaskId) -> OsResult<()> {
        let result = self.activate(task);
        self.report(ServiceId::ActivateTask, task.0 as u32, result)
    }

    fn activate(&mut self, task: TaskId) -> OsResult<()> {
        self.require(ACTIVATION_LEVELS)?;
        let thread = self.task_thread(task)?;

        let tcb = &self.tasks[thread.0];
        if tcb.current_active >= tcb.max_active {
            return Err(OsError::ActivationLimitExceeded);
        }
        self.reserve_request()?;

        self.arm_activation(thread);
        self.submit(Request::Activate(thread));
        Ok(())
    }

    /// Count one activation, clearing the events of an extended task that
    /// was suspended
    pub(crate) fn arm_activation(&mut self, thread: ThreadId) {
        let tcb = &mut self.tasks[thread.0];
        if tcb.current_active == 0 && tcb.is_extended() {
            tcb.set_events = 0;
            tcb.wait_events = 0;
        }
        tcb.current_active += 1;
    }

    // ============ Termination ============

    /// Terminate the calling task
    ///
    /// The task restarts from its entry point if more activations are
    /// pending, otherwise it becomes suspended.
    ///
    /// # Returns
    /// * `Err(OsError::ResourceStillHeld)` - An external resource is still held
    /// * `Err(OsError::WrongCallContext)` - Caller is not a task
    pub fn terminate_task(&mut self) -> OsResult<()> {
        let result = self.terminate();
        self.report(ServiceId::TerminateTask, 0, result)
    }

    fn terminate(&mut self) -> OsResult<()> {
        let thread = self.calling_task()?;
        if self.tasks[thread.0].holds_resources() {
            return Err(OsError::ResourceStillHeld);
        }
        self.submit(Request::Terminate(thread));
        Ok(())
    }

    /// Terminate the calling task and activate `task` in one step
    ///
    /// Chaining to the caller itself skips the activation limit check.
    pub fn chain_task(&mut self, task: TaskId) -> OsResult<()> {
        let result = self.chain(task);
        self.report(ServiceId::ChainTask, task.0 as u32, result)
    }

    fn chain(&mut self, task: TaskId) -> OsResult<()> {
        let from = self.calling_task()?;
        let to = self.task_thread(task)?;

        if self.tasks[from.0].holds_resources() {
            return Err(OsError::ResourceStillHeld);
        }
        if to != from {
            let target = &self.tasks[to.0];
            if target.current_active >= target.max_active {
                return Err(OsError::ActivationLimitExceeded);
            }
            self.arm_activation(to);
        }

        self.submit(Request::Chain { from, to });
        Ok(())
    }

    /// Give up internal resources and let higher priority tasks run
    ///
    /// Mainly useful for non-preemptable tasks and tasks in an internal
    /// resource group.
    pub fn schedule(&mut self) -> OsResult<()> {
        let result = self.yield_now();
        self.report(ServiceId::Schedule, 0, result)
    }

    fn yield_now(&mut self) -> OsResult<()> {
        let thread = self.calling_task()?;
        if self.tasks[thread.0].holds_resources() {
            return Err(OsError::ResourceStillHeld);
        }
        self.submit(Request::Schedule(thread));
        Ok(())
    }

    /// Called by a port when a task or ISR body returns
    ///
    /// For an ISR this is the normal end of the routine. A task must leave
    /// through `terminate_task` or `chain_task`, so returning is fatal.
    pub fn entry_returned(&mut self) {
        let Some(thread) = self.port.current_thread() else {
            return;
        };
        let Some(tcb) = self.tasks.get(thread.0) else {
            return;
        };
        if tcb.is_task() {
            self.fatal(FatalError::TaskEndingWithoutChainOrTerminate);
        }
        self.submit(Request::Terminate(thread));
    }

    // ============ Queries ============

    /// Task in the RUNNING state, if any
    ///
    /// An ISR that preempted a task does not change the answer.
    #[inline]
    pub fn get_task_id(&self) -> Option<TaskId> {
        self.current_task
    }

    /// State of a task
    ///
    /// The answer is a snapshot and may be stale by the time it is used
    /// when the caller can be preempted.
    pub fn get_task_state(&mut self, task: TaskId) -> OsResult<TaskState> {
        let result = self.task_thread(task).map(|t| self.tasks[t.0].state);
        self.report(ServiceId::GetTaskState, task.0 as u32, result)
    }

    /// Pending activations of a task, the running one included
    pub fn activation_count(&self, task: TaskId) -> OsResult<u8> {
        self.task_thread(task).map(|t| self.tasks[t.0].current_active)
    }

    /// Priority a task currently occupies in the ready queues
    pub fn effective_priority(&self, task: TaskId) -> OsResult<Priority> {
        self.task_thread(task).map(|t| self.tasks[t.0].threshold)
    }

    /// Look a task up by name
    pub fn task_named(&self, name: &str) -> Option<TaskId> {
        self.thread_named(name)
            .filter(|t| self.tasks[t.0].is_task())
            .map(|t| TaskId(t.0))
    }

    pub(crate) fn thread_named(&self, name: &str) -> Option<ThreadId> {
        self.tasks
            .iter()
            .find(|(_, tcb)| tcb.name == name)
            .map(|(index, _)| ThreadId(index))
    }
}
