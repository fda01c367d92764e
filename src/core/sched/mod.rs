//! Scheduler module
//!
//! The ready scan and dispatch run by the System Manager after every
//! request, plus the queue moves that follow effective priority changes.
//!
//! The scan walks the levels from the highest down and, within a level,
//! takes the first entry whose task can run now. Entries that cannot
//! (waiting tasks, masked ISRs, tasks whose internal resources are held
//! elsewhere) are stepped over without being dequeued.

mod rdy_list;

pub use rdy_list::{ReadyList, ReadyQueues};

use crate::config::{OSEK_ISR2_PRIORITY, OSEK_NON_SCHEDULE_PRIORITY};
use crate::core::kernel::Kernel;
use crate::error::FatalError;
use crate::port::Port;
use crate::prio::substrate_priority;
use crate::types::{ExecutionContext, Priority, SchedulePolicy, TaskId, TaskState, ThreadId};

impl<P: Port> Kernel<P> {
    /// Find the entry that should run
    pub(crate) fn ready_scan(&mut self) -> Option<ThreadId> {
        let mut level = self.ready.highest();

        while let Some(prio) = level {
            let len = self.ready.level(prio).len();
            for i in 0..len {
                let thread = self.ready.level(prio).as_slice()[i];
                if self.admit(thread, prio) {
                    return Some(thread);
                }
            }
            level = self.ready.prio_table().next_below(prio);
        }

        None
    }

    /// Eligibility check for an entry found at `level`
    ///
    /// On success internal resources are taken and the entry is moved to
    /// the level of its effective priority.
    fn admit(&mut self, thread: ThreadId, level: Priority) -> bool {
        let tcb = &self.tasks[thread.0];

        if tcb.state == TaskState::Waiting {
            return false;
        }

        if tcb.is_isr() {
            let masked = self.interrupts_suspended()
                || self.mode.map_or(false, ExecutionContext::is_hook);
            return !masked || self.running == Some(thread);
        }

        let lost_resource = tcb
            .held
            .iter()
            .any(|r| self.resource_holder(*r) != Some(thread));
        if lost_resource {
            return false;
        }

        if !tcb.internal.is_empty() && !tcb.internal_held {
            let taken = tcb
                .internal
                .iter()
                .any(|r| self.resource_holder(*r).map_or(false, |o| o != thread));
            if taken {
                return false;
            }
            let tcb = &mut self.tasks[thread.0];
            for r in tcb.internal.iter() {
                self.resources[r.0].owner = Some(thread);
            }
            tcb.internal_held = true;
        }

        let target = self.priority_for(thread);
        if target != level {
            self.ready.remove(level, thread);
            self.enqueue(target, thread, true);
            self.set_threshold(thread, target);
        }
        true
    }

    /// Resume the scan winner, suspending whoever ran before
    ///
    /// Pre and post task hooks run when the RUNNING task changes. An ISR
    /// winning over a task leaves that task RUNNING.
    pub(crate) fn dispatch(&mut self, winner: Option<ThreadId>) {
        if winner == self.running {
            if winner.is_none() {
                crate::trace!("no task to run");
            }
            return;
        }

        if let Some(prev) = self.running.take() {
            let result = self.port.thread_suspend(prev);
            self.port_call(result, FatalError::ThreadSuspend);
        }

        let Some(next) = winner else {
            crate::trace!("no task to run");
            return;
        };
        crate::debug!("dispatch thread {=u8}", next.0);

        if self.tasks[next.0].is_task() {
            let task = TaskId(next.0);
            if self.current_task != Some(task) {
                if let Some(old) = self.current_task {
                    if let Some(hook) = self.hooks.post_task {
                        self.run_hook(ExecutionContext::PostTaskHook, |k| hook(k));
                    }
                    let old = &mut self.tasks[old.0];
                    if old.state == TaskState::Running {
                        old.state = TaskState::Ready;
                    }
                }
                self.current_task = Some(task);
                self.tasks[next.0].state = TaskState::Running;
                if let Some(hook) = self.hooks.pre_task {
                    self.run_hook(ExecutionContext::PreTaskHook, |k| hook(k));
                }
            }
            self.tasks[next.0].state = TaskState::Running;
        }

        self.running = Some(next);
        let result = self.port.thread_resume(next);
        self.port_call(result, FatalError::ThreadResume);
    }

    /// Priority a thread must run at given what it holds
    pub(crate) fn priority_for(&self, thread: ThreadId) -> Priority {
        let tcb = &self.tasks[thread.0];
        if tcb.is_isr() {
            return OSEK_ISR2_PRIORITY;
        }

        let mut prio = tcb.org_prio;
        if tcb.policy == SchedulePolicy::Non || tcb.resource_scheduler {
            prio = prio.max(OSEK_NON_SCHEDULE_PRIORITY);
        }
        for r in tcb.held.iter() {
            prio = prio.max(self.resource_ceiling_of(*r));
        }
        if tcb.internal_held {
            for r in tcb.internal.iter() {
                prio = prio.max(self.resource_ceiling_of(*r));
            }
        }
        prio
    }

    /// Move the running entry of a thread to the head of the level of its
    /// new effective priority
    pub(crate) fn reposition(&mut self, thread: ThreadId) {
        let from = self.tasks[thread.0].threshold;
        let to = self.priority_for(thread);
        if from == to {
            return;
        }
        if !self.ready.remove(from, thread) {
            self.fatal(FatalError::CorruptedObject);
        }
        self.enqueue(to, thread, true);
        self.set_threshold(thread, to);
    }

    /// Remove the running entry and fall back to the design priority
    pub(crate) fn drop_running_entry(&mut self, thread: ThreadId) {
        let level = self.tasks[thread.0].threshold;
        if !self.ready.remove(level, thread) {
            self.fatal(FatalError::CorruptedObject);
        }
        let org = self.tasks[thread.0].org_prio;
        self.set_threshold(thread, org);
    }

    pub(crate) fn enqueue(&mut self, prio: Priority, thread: ThreadId, front: bool) {
        let result = if front {
            self.ready.push_front(prio, thread)
        } else {
            self.ready.push_back(prio, thread)
        };
        if result.is_err() {
            self.fatal(FatalError::ReadyQueueOverflow);
        }
    }

    fn set_threshold(&mut self, thread: ThreadId, prio: Priority) {
        let tcb = &mut self.tasks[thread.0];
        if tcb.threshold == prio {
            return;
        }
        tcb.threshold = prio;
        if tcb.has_thread() {
            let result = self.port.preemption_change(thread, substrate_priority(prio));
            self.port_call(result, FatalError::PreemptionChange);
        }
    }
}
