//! Event management module
//!
//! Events are single bits of a 32-bit mask, allocated at initialization
//! and assigned to extended tasks. A task waits on a mask and is made ready
//! again when any bit of it is set.

use crate::config::OSEK_MAX_EVENTS;
use crate::core::kernel::{Kernel, ACTIVATION_LEVELS};
use crate::core::sysmgr::Request;
use crate::error::{OsError, OsResult, ServiceId};
use crate::port::Port;
use crate::types::{EventMask, TaskId, TaskState};

impl<P: Port> Kernel<P> {
    /// Allocate an event bit
    ///
    /// # Returns
    /// * `Ok(EventMask)` - Mask with the lowest free bit set
    /// * `Err(OsError::NoFreeEvent)` - All bits are in use
    pub fn create_event(&mut self) -> OsResult<EventMask> {
        self.require_init()?;

        let free = !self.events_allocated;
        if free == 0 {
            return Err(OsError::NoFreeEvent);
        }
        let bit = free.trailing_zeros();
        debug_assert!((bit as usize) < OSEK_MAX_EVENTS);

        let mask = 1 << bit;
        self.events_allocated |= mask;
        crate::info!("event {=u32:#x} created", mask);
        Ok(mask)
    }

    /// Assign events to an extended task
    ///
    /// # Returns
    /// * `Err(OsError::CapabilityMissing)` - Task is basic
    /// * `Err(OsError::InvalidObject)` - Empty mask or bits never allocated
    pub fn register_event_to_task(&mut self, mask: EventMask, task: TaskId) -> OsResult<()> {
        self.require_init()?;
        let thread = self.task_thread(task)?;

        if mask == 0 || mask & !self.events_allocated != 0 {
            return Err(OsError::InvalidObject);
        }
        let tcb = &mut self.tasks[thread.0];
        if !tcb.is_extended() {
            return Err(OsError::CapabilityMissing);
        }
        tcb.events |= mask;
        Ok(())
    }

    /// Set events of a task
    ///
    /// A task waiting on one of the bits becomes ready at its design
    /// priority.
    ///
    /// # Returns
    /// * `Err(OsError::CapabilityMissing)` - Task is basic
    /// * `Err(OsError::InvalidState)` - Task is suspended
    pub fn set_event(&mut self, task: TaskId, mask: EventMask) -> OsResult<()> {
        let result = self.post_event(task, mask);
        self.report(ServiceId::SetEvent, task.0 as u32, result)
    }

    fn post_event(&mut self, task: TaskId, mask: EventMask) -> OsResult<()> {
        self.require(ACTIVATION_LEVELS)?;
        let thread = self.task_thread(task)?;

        let tcb = &self.tasks[thread.0];
        if !tcb.is_extended() {
            return Err(OsError::CapabilityMissing);
        }
        if tcb.state == TaskState::Suspended {
            return Err(OsError::InvalidState);
        }
        let wakes = tcb.state == TaskState::Waiting && tcb.wait_events & mask != 0;
        if wakes {
            self.reserve_request()?;
        }
        self.tasks[thread.0].set_events |= mask;

        if wakes {
            self.submit(Request::SetEvent(thread));
        }
        Ok(())
    }

    /// Clear events of the calling task
    pub fn clear_event(&mut self, mask: EventMask) -> OsResult<()> {
        let result = self.calling_task().and_then(|thread| {
            let tcb = &mut self.tasks[thread.0];
            if !tcb.is_extended() {
                return Err(OsError::CapabilityMissing);
            }
            tcb.set_events &= !mask;
            Ok(())
        });
        self.report(ServiceId::ClearEvent, mask, result)
    }

    /// Events currently set for a task
    ///
    /// # Returns
    /// * `Err(OsError::CapabilityMissing)` - Task is basic
    /// * `Err(OsError::InvalidState)` - Task is suspended
    pub fn get_event(&mut self, task: TaskId) -> OsResult<EventMask> {
        let result = self.task_thread(task).and_then(|thread| {
            let tcb = &self.tasks[thread.0];
            if !tcb.is_extended() {
                return Err(OsError::CapabilityMissing);
            }
            if tcb.state == TaskState::Suspended {
                return Err(OsError::InvalidState);
            }
            Ok(tcb.set_events)
        });
        self.report(ServiceId::GetEvent, task.0 as u32, result)
    }

    /// Wait until one of the events in `mask` is set
    ///
    /// Returns at once if one already is. Otherwise the calling task gives
    /// up its internal resources and leaves the CPU; the call completes
    /// when the System Manager resumes it.
    ///
    /// # Returns
    /// * `Err(OsError::CapabilityMissing)` - Basic task or no events assigned
    /// * `Err(OsError::ResourceStillHeld)` - A resource is still held
    /// * `Err(OsError::WrongCallContext)` - Caller is not a task
    pub fn wait_event(&mut self, mask: EventMask) -> OsResult<()> {
        let result = self.wait(mask);
        self.report(ServiceId::WaitEvent, mask, result)
    }

    fn wait(&mut self, mask: EventMask) -> OsResult<()> {
        let thread = self.calling_task()?;

        let tcb = &mut self.tasks[thread.0];
        if !tcb.is_extended() || tcb.events == 0 {
            return Err(OsError::CapabilityMissing);
        }
        if tcb.holds_resources() {
            return Err(OsError::ResourceStillHeld);
        }
        if tcb.set_events & mask != 0 {
            return Ok(());
        }

        tcb.wait_events = mask;
        self.submit(Request::Wait(thread));
        Ok(())
    }
}
