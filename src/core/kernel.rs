//! Kernel state and the OS lifecycle
//!
//! [`Kernel`] owns every pool, the ready queues and the System Manager
//! channel. Services are methods on it, split across the modules that
//! implement them. [`Os`] wraps a kernel so it can live in a `static`
//! and be reached from tasks and interrupt handlers.

use heapless::Deque;
use portable_atomic::{AtomicBool, Ordering};

use crate::config::{
    OSEK_MAX_ALARMS, OSEK_MAX_COUNTERS, OSEK_MAX_RES, OSEK_MAX_TASKS,
    OSEK_NON_SCHEDULE_PRIORITY, SYSMGR_QUEUE_DEPTH,
};
use crate::core::cs_cell::CsCell;
use crate::core::hooks::Hooks;
use crate::core::pool::Pool;
use crate::core::resource::Resource;
use crate::core::sched::ReadyQueues;
use crate::core::sysmgr::Request;
use crate::core::task::Tcb;
use crate::core::time::{Alarm, Counter};
use crate::critical::critical_section;
use crate::error::{ErrorInfo, FatalError, OsError, OsResult, ServiceId};
use crate::port::{Port, PortError};
use crate::types::{
    AppMode, CounterId, EventMask, ExecutionContext, IsrId, ResourceKind, StatusType, TaskId,
    ThreadId, RES_SCHEDULER,
};

// ============ Call levels ============

/// Levels allowed to activate tasks and set events
pub(crate) const ACTIVATION_LEVELS: &[ExecutionContext] = &[
    ExecutionContext::Task,
    ExecutionContext::Isr2,
    ExecutionContext::Timer,
    ExecutionContext::AlarmCallback,
    ExecutionContext::Idle,
];

/// Levels allowed to arm and query alarms
pub(crate) const ALARM_LEVELS: &[ExecutionContext] = &[
    ExecutionContext::Task,
    ExecutionContext::Isr2,
    ExecutionContext::AlarmCallback,
    ExecutionContext::ErrorHook,
    ExecutionContext::PreTaskHook,
    ExecutionContext::PostTaskHook,
    ExecutionContext::Idle,
];

/// Levels allowed to shut the system down
const SHUTDOWN_LEVELS: &[ExecutionContext] = &[
    ExecutionContext::Task,
    ExecutionContext::Isr2,
    ExecutionContext::ErrorHook,
    ExecutionContext::StartupHook,
    ExecutionContext::Idle,
];

// ============ Kernel State Structures ============

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Objects may be created
    Init,
    Running,
    /// Stopped by `shutdown_os`, waiting for `cleanup`
    Shutdown,
}

/// Interrupt masking requested through the interrupt services
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct InterruptState {
    pub all_disabled: bool,
    pub all_nest: u8,
    pub os_nest: u8,
}

/// The OSEK kernel over a primitive runtime `P`
pub struct Kernel<P: Port> {
    pub(crate) port: P,
    pub(crate) hooks: Hooks<P>,
    pub(crate) phase: Phase,
    /// Non-task level currently executing; `None` is normal execution
    pub(crate) mode: Option<ExecutionContext>,
    pub(crate) app_mode: AppMode,

    // ============ Pools ============
    pub(crate) tasks: Pool<Tcb, OSEK_MAX_TASKS>,
    pub(crate) resources: Pool<Resource, OSEK_MAX_RES>,
    pub(crate) counters: Pool<Counter, OSEK_MAX_COUNTERS>,
    pub(crate) alarms: Pool<Alarm<P>, OSEK_MAX_ALARMS>,
    pub(crate) events_allocated: EventMask,
    pub(crate) system_counter: Option<CounterId>,
    pub(crate) isr_count: u8,

    // ============ Scheduling ============
    pub(crate) ready: ReadyQueues,
    pub(crate) requests: Deque<Request, SYSMGR_QUEUE_DEPTH>,
    pub(crate) sysmgr_active: bool,
    /// Thread last resumed by the System Manager
    pub(crate) running: Option<ThreadId>,
    /// Task in the RUNNING state
    pub(crate) current_task: Option<TaskId>,
    pub(crate) interrupts: InterruptState,

    pub(crate) last_error: Option<ErrorInfo>,
}

impl<P: Port> Kernel<P> {
    /// Create an empty kernel in the initialization phase
    ///
    /// `RES_SCHEDULER` is created here and always has id 0.
    pub fn new(port: P) -> Self {
        let mut kernel = Kernel {
            port,
            hooks: Hooks::new(),
            phase: Phase::Init,
            mode: None,
            app_mode: 0,

            tasks: Pool::new(),
            resources: Pool::new(),
            counters: Pool::new(),
            alarms: Pool::new(),
            events_allocated: 0,
            system_counter: None,
            isr_count: 0,

            ready: ReadyQueues::new(),
            requests: Deque::new(),
            sysmgr_active: false,
            running: None,
            current_task: None,
            interrupts: InterruptState::default(),

            last_error: None,
        };
        kernel.create_res_scheduler();
        kernel
    }

    fn create_res_scheduler(&mut self) {
        let mut res = Resource::new("RES_SCHEDULER", ResourceKind::Standard, RES_SCHEDULER);
        res.ceiling = OSEK_NON_SCHEDULE_PRIORITY;
        // The pool is empty here, the first slot cannot be taken.
        let _ = self.resources.alloc(res);
    }

    /// Install hook routines
    ///
    /// # Returns
    /// * `Err(OsError::WrongCallContext)` - Called after `start_os`
    pub fn set_hooks(&mut self, hooks: Hooks<P>) -> OsResult<()> {
        self.require_init()?;
        self.hooks = hooks;
        Ok(())
    }

    #[inline]
    pub fn port(&self) -> &P {
        &self.port
    }

    #[inline]
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Last service error detected, whether or not an error hook ran
    #[inline]
    pub fn last_error(&self) -> Option<ErrorInfo> {
        self.last_error
    }

    /// Level the caller is executing at
    pub fn context(&self) -> ExecutionContext {
        if let Some(mode) = self.mode {
            return mode;
        }
        if self.phase == Phase::Init {
            return ExecutionContext::InitSystem;
        }
        match self.port.current_thread().and_then(|t| self.tasks.get(t.0)) {
            Some(tcb) if tcb.is_task() => ExecutionContext::Task,
            Some(_) => ExecutionContext::Isr2,
            None => ExecutionContext::Idle,
        }
    }

    // ============ Lifecycle ============

    /// Start the OS in application mode `mode`
    ///
    /// Runs the startup hook, arms autostart alarms and lets the System
    /// Manager activate the autostart tasks and dispatch the first one.
    ///
    /// # Returns
    /// * `Err(OsError::WrongCallContext)` - The OS was already started
    pub fn start_os(&mut self, mode: AppMode) -> OsResult<()> {
        self.require_init()?;

        crate::info!("starting OS in application mode {=u32}", mode);
        self.app_mode = mode;
        self.phase = Phase::Running;

        if let Some(hook) = self.hooks.startup {
            self.run_hook(ExecutionContext::StartupHook, |k| hook(k));
        }

        self.start_alarms();
        self.submit(Request::StartOs);
        Ok(())
    }

    /// Stop scheduling
    ///
    /// The shutdown hook runs with `status`, every thread is stopped and
    /// all alarms are disarmed. Objects stay allocated until `cleanup`.
    pub fn shutdown_os(&mut self, status: StatusType) -> OsResult<()> {
        let result = self.require(SHUTDOWN_LEVELS);
        if result.is_ok() {
            self.submit(Request::Shutdown(status));
        }
        self.report(ServiceId::ShutdownOs, status as u32, result)
    }

    pub(crate) fn shutdown(&mut self, status: StatusType) {
        crate::info!("OS shutdown with status {=u8}", status);

        if let Some(hook) = self.hooks.shutdown {
            self.run_hook(ExecutionContext::ShutdownHook, |k| hook(k, status));
        }
        self.phase = Phase::Shutdown;

        for (_, alarm) in self.alarms.iter_mut() {
            alarm.disarm();
        }
        for index in 0..self.tasks.len() as u8 {
            if self.tasks[index].has_thread() {
                let result = self.port.thread_terminate(ThreadId(index));
                self.port_call(result, FatalError::ThreadTerminate);
            }
            self.tasks[index].reset();
        }
        for (_, res) in self.resources.iter_mut() {
            res.owner = None;
        }

        if self.interrupts_suspended() {
            self.port.interrupts_enable();
        }
        self.ready.clear();
        self.requests.clear();
        self.running = None;
        self.current_task = None;
        self.interrupts = InterruptState::default();
    }

    /// Delete every object and return to the initialization phase
    ///
    /// # Returns
    /// * `Err(OsError::WrongCallContext)` - The OS is running
    /// * `Err(OsError::System)` - The substrate refused to delete a thread
    pub fn cleanup(&mut self) -> OsResult<()> {
        if self.phase == Phase::Running {
            return Err(OsError::WrongCallContext);
        }

        for index in 0..self.tasks.len() as u8 {
            if !self.tasks[index].has_thread() {
                continue;
            }
            let thread = ThreadId(index);
            if self.phase == Phase::Init {
                self.port.thread_terminate(thread).map_err(|_| OsError::System)?;
            }
            self.port.thread_delete(thread).map_err(|_| OsError::System)?;
        }

        self.tasks.clear();
        self.resources.clear();
        self.counters.clear();
        self.alarms.clear();
        self.events_allocated = 0;
        self.system_counter = None;
        self.isr_count = 0;
        self.ready.clear();
        self.requests.clear();
        self.running = None;
        self.current_task = None;
        self.interrupts = InterruptState::default();
        self.last_error = None;
        self.app_mode = 0;
        self.mode = None;
        self.phase = Phase::Init;
        self.create_res_scheduler();

        crate::info!("OS objects released");
        Ok(())
    }

    /// Application mode passed to `start_os`
    pub fn get_active_application_mode(&self) -> AppMode {
        self.app_mode
    }

    // ============ Internal helpers ============

    pub(crate) fn require_init(&self) -> OsResult<()> {
        if self.phase != Phase::Init {
            return Err(OsError::WrongCallContext);
        }
        Ok(())
    }

    /// Check the OS runs and the caller is at one of `allowed`
    pub(crate) fn require(&self, allowed: &[ExecutionContext]) -> OsResult<()> {
        if self.phase != Phase::Running || !allowed.contains(&self.context()) {
            return Err(OsError::WrongCallContext);
        }
        Ok(())
    }

    /// Thread of the calling task
    pub(crate) fn calling_task(&self) -> OsResult<ThreadId> {
        self.require(&[ExecutionContext::Task])?;
        self.port.current_thread().ok_or(OsError::WrongCallContext)
    }

    /// Validate a task handle
    pub(crate) fn task_thread(&self, task: TaskId) -> OsResult<ThreadId> {
        match self.tasks.get(task.0) {
            Some(tcb) if tcb.is_task() => Ok(task.thread()),
            _ => Err(OsError::InvalidObject),
        }
    }

    /// Validate an ISR handle
    pub(crate) fn isr_thread(&self, isr: IsrId) -> OsResult<ThreadId> {
        match self.tasks.get(isr.0) {
            Some(tcb) if tcb.is_isr() => Ok(isr.thread()),
            _ => Err(OsError::InvalidObject),
        }
    }

    /// Record a service error and hand it to the error hook
    ///
    /// The hook is not called from inside itself.
    pub(crate) fn report<T>(
        &mut self,
        service: ServiceId,
        param: u32,
        result: OsResult<T>,
    ) -> OsResult<T> {
        if let Err(error) = result {
            let info = ErrorInfo {
                service,
                error,
                param,
            };
            crate::warn!("{} failed: {}", service, error);
            self.last_error = Some(info);

            if self.phase == Phase::Running
                && self.hooks.error.is_some()
                && self.mode != Some(ExecutionContext::ErrorHook)
                && !self.try_submit(Request::ErrorHook(info))
            {
                crate::warn!("error hook dropped, System Manager queue full");
            }
        }
        result
    }

    /// Run `f` at hook level
    pub(crate) fn run_hook<F>(&mut self, level: ExecutionContext, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let saved = self.mode.replace(level);
        f(self);
        self.mode = saved;
    }

    /// Turn a substrate failure during the run phase into a fatal error
    #[inline]
    pub(crate) fn port_call(&mut self, result: Result<(), PortError>, error: FatalError) {
        if result.is_err() {
            self.fatal(error);
        }
    }

    /// Halt the system
    pub(crate) fn fatal(&mut self, error: FatalError) -> ! {
        crate::error!("fatal error {}", error);
        self.port.fatal(error)
    }
}

// ============ Shared instance ============

/// Kernel cell that can be placed in a `static`
///
/// # Example
/// ```ignore
/// static OS: Os<BoardPort> = Os::new();
///
/// fn control_body() {
///     let _ = OS.with(|k| k.terminate_task());
/// }
/// ```
pub struct Os<P: Port> {
    kernel: CsCell<Option<Kernel<P>>>,
    busy: AtomicBool,
}

impl<P: Port> Os<P> {
    pub const fn new() -> Self {
        Os {
            kernel: CsCell::new(None),
            busy: AtomicBool::new(false),
        }
    }

    /// Place a configured kernel in the cell
    ///
    /// # Returns
    /// * `Err(OsError::InvalidState)` - A kernel is already installed
    pub fn install(&self, kernel: Kernel<P>) -> OsResult<()> {
        critical_section(|cs| {
            if self.busy.load(Ordering::Acquire) {
                return Err(OsError::WrongCallContext);
            }
            let slot = self.kernel.get(cs);
            if slot.is_some() {
                return Err(OsError::InvalidState);
            }
            *slot = Some(kernel);
            Ok(())
        })
    }

    /// Take the kernel back out of the cell
    pub fn take(&self) -> Option<Kernel<P>> {
        critical_section(|cs| {
            if self.busy.load(Ordering::Acquire) {
                return None;
            }
            self.kernel.get(cs).take()
        })
    }

    /// Run `f` on the kernel inside a critical section
    ///
    /// # Returns
    /// * `Err(OsError::WrongCallContext)` - Called from inside another `with`
    /// * `Err(OsError::InvalidState)` - No kernel installed
    pub fn with<R, F>(&self, f: F) -> OsResult<R>
    where
        F: FnOnce(&mut Kernel<P>) -> R,
    {
        critical_section(|cs| {
            if self.busy.swap(true, Ordering::Acquire) {
                return Err(OsError::WrongCallContext);
            }
            let result = match self.kernel.get(cs).as_mut() {
                Some(kernel) => Ok(f(kernel)),
                None => Err(OsError::InvalidState),
            };
            self.busy.store(false, Ordering::Release);
            result
        })
    }
}

impl<P: Port> Default for Os<P> {
    fn default() -> Self {
        Self::new()
    }
}
