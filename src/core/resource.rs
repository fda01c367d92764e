//! Resource management module
//!
//! Mutual exclusion with the OSEK priority ceiling protocol. The ceiling of
//! a resource is the highest design priority of the tasks and ISRs
//! registered to it, fixed once the OS starts. A holder runs at the highest
//! ceiling among what it holds, so nothing that could ask for the same
//! resource can preempt it.
//!
//! Linked resources are aliases: ownership is tracked on the standard
//! resource they resolve to. Internal resources are never named in
//! `get_resource`; the scheduler takes them when their task is selected
//! and gives them back when it terminates, waits or yields.

use crate::config::OSEK_ISR2_PRIORITY;
use crate::core::kernel::Kernel;
use crate::core::sysmgr::Request;
use crate::error::{OsError, OsResult, ServiceId};
use crate::port::Port;
use crate::types::{IsrId, Priority, ResourceId, ResourceKind, TaskId, ThreadId, RES_SCHEDULER};

/// Resource control block
#[derive(Debug, Clone, Copy)]
pub struct Resource {
    pub name: &'static str,
    pub kind: ResourceKind,
    pub ceiling: Priority,
    /// Holder; only meaningful on the resolved resource
    pub owner: Option<ThreadId>,
    /// Standard resource reached by following links
    pub resolved: ResourceId,
}

impl Resource {
    pub fn new(name: &'static str, kind: ResourceKind, resolved: ResourceId) -> Self {
        Resource {
            name,
            kind,
            ceiling: 0,
            owner: None,
            resolved,
        }
    }

    #[inline]
    pub fn is_internal(&self) -> bool {
        self.kind == ResourceKind::Internal
    }
}

impl<P: Port> Kernel<P> {
    // ============ Creation ============

    /// Create a resource
    ///
    /// A linked resource must name an existing standard or linked resource.
    ///
    /// # Returns
    /// * `Ok(ResourceId)` - Handle of the new resource
    /// * `Err(OsError::NameExists)` - Name already used by a resource
    /// * `Err(OsError::InvalidObject)` - Link target missing or internal
    /// * `Err(OsError::NoFreeSlot)` - Resource pool exhausted
    pub fn create_resource(&mut self, name: &'static str, kind: ResourceKind) -> OsResult<ResourceId> {
        self.require_init()?;

        if self.resources.iter().any(|(_, r)| r.name == name) {
            return Err(OsError::NameExists);
        }

        let index = self.resources.len() as u8;
        let resolved = match kind {
            ResourceKind::Linked(target) => match self.resources.get(target.0) {
                Some(t) if !t.is_internal() => t.resolved,
                _ => return Err(OsError::InvalidObject),
            },
            _ => ResourceId(index),
        };

        let index = self.resources.alloc(Resource::new(name, kind, resolved))?;
        crate::info!("resource {=str} created with id {=u8}", name, index);
        Ok(ResourceId(index))
    }

    /// Assign a resource to a task
    ///
    /// Raises the ceiling to the task priority. Registering twice is
    /// harmless. `RES_SCHEDULER` is implicitly available to every task.
    ///
    /// # Returns
    /// * `Err(OsError::InvalidObject)` - Bad handle, or the OS already started
    /// * `Err(OsError::ListFull)` - The task's resource list is full
    pub fn register_resource_to_task(&mut self, res: ResourceId, task: TaskId) -> OsResult<()> {
        if self.require_init().is_err() {
            return Err(OsError::InvalidObject);
        }
        let thread = self.task_thread(task)?;
        let resource = *self.resources.get(res.0).ok_or(OsError::InvalidObject)?;
        if res == RES_SCHEDULER {
            return Ok(());
        }

        let tcb = &mut self.tasks[thread.0];
        if resource.is_internal() {
            if !tcb.internal.contains(&res) {
                tcb.internal.push(res).map_err(|_| OsError::ListFull)?;
            }
        } else if !tcb.external.contains(&res) {
            tcb.external.push(res).map_err(|_| OsError::ListFull)?;
        }

        let prio = tcb.org_prio;
        self.raise_ceiling(res, prio);
        Ok(())
    }

    /// Allow an ISR to use a resource
    ///
    /// The ceiling becomes the ISR2 level, so a task holding the resource
    /// also blocks category 2 interrupts.
    pub fn register_resource_to_isr(&mut self, res: ResourceId, isr: IsrId) -> OsResult<()> {
        if self.require_init().is_err() {
            return Err(OsError::InvalidObject);
        }
        self.isr_thread(isr)?;
        let resource = self.resources.get(res.0).ok_or(OsError::InvalidObject)?;
        if res == RES_SCHEDULER || resource.is_internal() {
            return Err(OsError::InvalidObject);
        }
        self.raise_ceiling(res, OSEK_ISR2_PRIORITY);
        Ok(())
    }

    fn raise_ceiling(&mut self, res: ResourceId, prio: Priority) {
        let resolved = self.resources[res.0].resolved;
        for id in [res, resolved] {
            let r = &mut self.resources[id.0];
            r.ceiling = r.ceiling.max(prio);
        }
    }

    // ============ Acquisition ============

    /// Occupy a resource
    ///
    /// The caller's effective priority rises to the ceiling. With
    /// `RES_SCHEDULER` the caller becomes non-preemptable.
    ///
    /// # Returns
    /// * `Err(OsError::InvalidObject)` - Bad handle or internal resource
    /// * `Err(OsError::AlreadyOccupied)` - Resource is held
    /// * `Err(OsError::NotRegistered)` - Resource not assigned to the caller
    /// * `Err(OsError::WrongCallContext)` - Caller is not a task
    pub fn get_resource(&mut self, res: ResourceId) -> OsResult<()> {
        let result = self.acquire(res);
        self.report(ServiceId::GetResource, res.0 as u32, result)
    }

    fn acquire(&mut self, res: ResourceId) -> OsResult<()> {
        let thread = self.calling_task()?;
        let resource = *self.resources.get(res.0).ok_or(OsError::InvalidObject)?;

        if res == RES_SCHEDULER {
            let tcb = &mut self.tasks[thread.0];
            if tcb.resource_scheduler {
                return Err(OsError::AlreadyOccupied);
            }
            tcb.resource_scheduler = true;
            self.resources[res.0].owner = Some(thread);
        } else {
            if resource.is_internal() {
                return Err(OsError::InvalidObject);
            }
            if self.resources[resource.resolved.0].owner.is_some() {
                return Err(OsError::AlreadyOccupied);
            }
            let tcb = &mut self.tasks[thread.0];
            if !tcb.external.contains(&res) {
                return Err(OsError::NotRegistered);
            }
            tcb.held.push(res).map_err(|_| OsError::ListFull)?;
            self.resources[resource.resolved.0].owner = Some(thread);
        }

        crate::trace!("resource {=u8} taken by thread {=u8}", res.0, thread.0);
        if self.priority_for(thread) != self.tasks[thread.0].threshold {
            self.submit(Request::GetResource(thread));
        }
        Ok(())
    }

    /// Release a resource
    ///
    /// Standard and linked resources must be released in reverse order of
    /// acquisition. The caller drops back to the highest ceiling it still
    /// holds, or to its design priority.
    ///
    /// # Returns
    /// * `Err(OsError::NotOccupied)` - Caller does not hold the resource
    /// * `Err(OsError::NotInOrder)` - Another resource was taken later
    pub fn release_resource(&mut self, res: ResourceId) -> OsResult<()> {
        let result = self.release(res);
        self.report(ServiceId::ReleaseResource, res.0 as u32, result)
    }

    fn release(&mut self, res: ResourceId) -> OsResult<()> {
        let thread = self.calling_task()?;
        let resource = *self.resources.get(res.0).ok_or(OsError::InvalidObject)?;

        if res == RES_SCHEDULER {
            let tcb = &mut self.tasks[thread.0];
            if !tcb.resource_scheduler {
                return Err(OsError::NotOccupied);
            }
            tcb.resource_scheduler = false;
            self.resources[res.0].owner = None;
        } else {
            if resource.is_internal() {
                return Err(OsError::InvalidObject);
            }
            if self.resources[resource.resolved.0].owner != Some(thread) {
                return Err(OsError::NotOccupied);
            }
            let tcb = &mut self.tasks[thread.0];
            if tcb.held.last() != Some(&res) {
                return Err(OsError::NotInOrder);
            }
            tcb.held.pop();
            self.resources[resource.resolved.0].owner = None;
        }

        crate::trace!("resource {=u8} released by thread {=u8}", res.0, thread.0);
        if self.priority_for(thread) != self.tasks[thread.0].threshold {
            self.submit(Request::ReleaseResource(thread));
        }
        Ok(())
    }

    /// Give back the internal resources of a thread
    pub(crate) fn release_internal(&mut self, thread: ThreadId) {
        let tcb = &mut self.tasks[thread.0];
        if !tcb.internal_held {
            return;
        }
        for r in tcb.internal.iter() {
            let res = &mut self.resources[r.0];
            if res.owner == Some(thread) {
                res.owner = None;
            }
        }
        tcb.internal_held = false;
    }

    // ============ Queries ============

    pub(crate) fn resource_ceiling_of(&self, res: ResourceId) -> Priority {
        let resolved = self.resources[res.0].resolved;
        self.resources[resolved.0].ceiling
    }

    pub(crate) fn resource_holder(&self, res: ResourceId) -> Option<ThreadId> {
        let resolved = self.resources[res.0].resolved;
        self.resources[resolved.0].owner
    }

    /// Ceiling priority of a resource
    ///
    /// Values above `OSEK_MAX_PRIORITY` mean the resource is shared with an
    /// ISR or is `RES_SCHEDULER`.
    pub fn resource_ceiling(&self, res: ResourceId) -> OsResult<Priority> {
        self.resources.get(res.0).ok_or(OsError::InvalidObject)?;
        Ok(self.resource_ceiling_of(res))
    }

    /// Task currently holding a resource
    pub fn resource_owner(&self, res: ResourceId) -> OsResult<Option<TaskId>> {
        self.resources.get(res.0).ok_or(OsError::InvalidObject)?;
        Ok(self
            .resource_holder(res)
            .filter(|t| self.tasks.get(t.0).map_or(false, |tcb| tcb.is_task()))
            .map(|t| TaskId(t.0)))
    }

    /// Whether a task is allowed to take a resource right now
    ///
    /// True for `RES_SCHEDULER` and for any resource statically assigned to
    /// it, except internal ones.
    pub fn may_get_resource(&self, task: TaskId, res: ResourceId) -> OsResult<bool> {
        let thread = self.task_thread(task)?;
        self.resources.get(res.0).ok_or(OsError::InvalidObject)?;
        Ok(res == RES_SCHEDULER || self.tasks[thread.0].external.contains(&res))
    }
}
