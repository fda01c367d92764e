//! System Manager - the single consumer of scheduling requests
//!
//! Services never touch the ready queues. They post a [`Request`] and the
//! System Manager, which runs above every task and ISR, applies it and
//! re-runs the ready scan before taking the next one. Requests posted
//! while a timer, alarm callback or hook is executing stay queued until
//! that level is left.

use crate::error::{ErrorInfo, FatalError, OsError, OsResult};
use crate::core::kernel::{Kernel, Phase};
use crate::port::Port;
use crate::types::{ExecutionContext, StatusType, TaskState, ThreadId};

/// Message to the System Manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Activate autostart tasks and dispatch the first one
    StartOs,
    /// Queue an activation already counted by the caller
    Activate(ThreadId),
    Terminate(ThreadId),
    Chain { from: ThreadId, to: ThreadId },
    /// Yield, releasing internal resources
    Schedule(ThreadId),
    Wait(ThreadId),
    /// Wake a waiting task if its events arrived
    SetEvent(ThreadId),
    GetResource(ThreadId),
    ReleaseResource(ThreadId),
    /// Plain rescheduling point
    Dispatch,
    ErrorHook(ErrorInfo),
    Shutdown(StatusType),
}

impl<P: Port> Kernel<P> {
    /// Post a request, processing it at once from normal execution
    ///
    /// A full channel is fatal. Services that can run from a timer, alarm
    /// callback or ISR level call [`Kernel::reserve_request`] first.
    pub(crate) fn submit(&mut self, request: Request) {
        if !self.try_submit(request) {
            self.fatal(FatalError::SysmgrQueueSend);
        }
    }

    /// Fail with `ListFull` when a request could not be posted
    pub(crate) fn reserve_request(&self) -> OsResult<()> {
        if self.phase == Phase::Running && self.requests.is_full() {
            crate::warn!("system manager channel full");
            return Err(OsError::ListFull);
        }
        Ok(())
    }

    /// Post a request unless the channel is full
    pub(crate) fn try_submit(&mut self, request: Request) -> bool {
        if self.phase != Phase::Running {
            crate::trace!("request {} ignored, OS not running", request);
            return true;
        }
        if self.requests.push_back(request).is_err() {
            return false;
        }
        if self.mode.is_none() {
            self.run_system_manager();
        }
        true
    }

    /// Drain the request channel
    ///
    /// A port whose substrate has a real supervisor thread calls this from
    /// it. Nested calls return immediately.
    pub fn run_system_manager(&mut self) {
        if self.sysmgr_active {
            return;
        }
        self.sysmgr_active = true;

        while let Some(request) = self.requests.pop_front() {
            crate::trace!("system manager: {}", request);
            self.process(request);

            if self.phase != Phase::Running {
                self.requests.clear();
                break;
            }

            let winner = self.ready_scan();
            self.dispatch(winner);
        }

        self.sysmgr_active = false;
    }

    fn process(&mut self, request: Request) {
        match request {
            Request::StartOs => self.activate_autostart(),
            Request::Activate(thread) => self.make_ready(thread),
            Request::Terminate(thread) => self.retire(thread),
            Request::Chain { from, to } => {
                self.retire(from);
                if from == to {
                    self.arm_activation(to);
                }
                self.make_ready(to);
            }
            Request::Schedule(thread) => self.yield_thread(thread),
            Request::Wait(thread) => self.block(thread),
            Request::SetEvent(thread) => self.wake(thread),
            Request::GetResource(thread) | Request::ReleaseResource(thread) => {
                self.reposition(thread)
            }
            Request::Dispatch => {}
            Request::ErrorHook(info) => {
                if let Some(hook) = self.hooks.error {
                    self.run_hook(ExecutionContext::ErrorHook, |k| hook(k, info));
                }
            }
            Request::Shutdown(status) => self.shutdown(status),
        }
    }

    fn activate_autostart(&mut self) {
        let mode = self.app_mode;
        for index in 0..self.tasks.len() as u8 {
            let tcb = &self.tasks[index];
            if tcb.is_task() && tcb.autostart && tcb.app_mode & mode != 0 {
                let thread = ThreadId(index);
                self.arm_activation(thread);
                self.make_ready(thread);
            }
        }
        crate::info!("scheduler started");
    }

    /// Append an activation entry at the design priority
    fn make_ready(&mut self, thread: ThreadId) {
        let tcb = &mut self.tasks[thread.0];
        if tcb.state == TaskState::Suspended {
            tcb.state = TaskState::Ready;
        }
        let prio = tcb.org_prio;
        self.enqueue(prio, thread, false);
    }

    /// Terminate the running entry of a thread
    ///
    /// Internal resources are released and the thread is rewound to its
    /// entry point, to be started again if activations remain.
    fn retire(&mut self, thread: ThreadId) {
        self.release_internal(thread);
        self.drop_running_entry(thread);

        let tcb = &self.tasks[thread.0];
        let is_task = tcb.is_task();
        if is_task && self.current_task.map(|t| t.thread()) == Some(thread) {
            if let Some(hook) = self.hooks.post_task {
                self.run_hook(ExecutionContext::PostTaskHook, |k| hook(k));
            }
            self.current_task = None;
        }

        let tcb = &mut self.tasks[thread.0];
        tcb.current_active = tcb.current_active.saturating_sub(1);
        tcb.state = if tcb.current_active == 0 {
            TaskState::Suspended
        } else {
            TaskState::Ready
        };

        if tcb.has_thread() {
            let result = self.port.thread_terminate(thread);
            self.port_call(result, FatalError::ThreadTerminate);
            let result = self.port.thread_reset(thread);
            self.port_call(result, FatalError::ThreadTerminate);
        }
        if self.running == Some(thread) {
            self.running = None;
        }
    }

    fn yield_thread(&mut self, thread: ThreadId) {
        self.release_internal(thread);
        self.drop_running_entry(thread);
        let prio = self.tasks[thread.0].org_prio;
        self.enqueue(prio, thread, true);
    }

    /// Park a task until one of its awaited events is set
    fn block(&mut self, thread: ThreadId) {
        self.release_internal(thread);
        self.drop_running_entry(thread);

        if self.current_task.map(|t| t.thread()) == Some(thread) {
            if let Some(hook) = self.hooks.post_task {
                self.run_hook(ExecutionContext::PostTaskHook, |k| hook(k));
            }
            self.current_task = None;
        }
        self.tasks[thread.0].state = TaskState::Waiting;

        let result = self.port.thread_suspend(thread);
        self.port_call(result, FatalError::ThreadSuspend);
        if self.running == Some(thread) {
            self.running = None;
        }
    }

    fn wake(&mut self, thread: ThreadId) {
        let tcb = &mut self.tasks[thread.0];
        if tcb.state != TaskState::Waiting || tcb.set_events & tcb.wait_events == 0 {
            return;
        }
        tcb.wait_events = 0;
        tcb.state = TaskState::Ready;
        let prio = tcb.org_prio;
        self.enqueue(prio, thread, false);
    }
}
