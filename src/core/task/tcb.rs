//! Thread Control Block definition
//!
//! One TCB per task or ISR. The kind tag tells the two apart; handles of
//! the wrong kind are rejected before a TCB is touched.

use heapless::Vec;

use crate::config::{OSEK_MAX_EXTERNAL_RES, OSEK_MAX_INTERNAL_RES};
use crate::port::ThreadEntry;
use crate::types::{
    AppMode, EventMask, IsrCategory, Priority, ResourceId, SchedulePolicy, TaskKind, TaskState,
};

/// What a control block stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThreadKind {
    Task,
    Isr(IsrCategory),
}

/// Thread Control Block
pub struct Tcb {
    // ============ Identification ============
    pub name: &'static str,
    pub kind: ThreadKind,
    pub entry: ThreadEntry,
    pub stack_size: usize,

    // ============ Priority ============
    /// Design-time priority
    pub org_prio: Priority,
    /// Level of the running entry in the ready queues
    pub threshold: Priority,
    pub policy: SchedulePolicy,
    pub task_kind: TaskKind,

    // ============ Activation ============
    pub autostart: bool,
    /// Application modes the task autostarts in
    pub app_mode: AppMode,
    pub max_active: u8,
    pub current_active: u8,
    pub state: TaskState,

    // ============ Events ============
    /// Events assigned at design time
    pub events: EventMask,
    pub wait_events: EventMask,
    pub set_events: EventMask,

    // ============ Resources ============
    /// Statically assigned standard and linked resources
    pub external: Vec<ResourceId, OSEK_MAX_EXTERNAL_RES>,
    /// Statically assigned internal resources
    pub internal: Vec<ResourceId, OSEK_MAX_INTERNAL_RES>,
    /// Acquired external resources, most recent last
    pub held: Vec<ResourceId, OSEK_MAX_EXTERNAL_RES>,
    pub internal_held: bool,
    /// Holds `RES_SCHEDULER`
    pub resource_scheduler: bool,
}

impl Tcb {
    pub fn new(name: &'static str, kind: ThreadKind, entry: ThreadEntry, prio: Priority) -> Self {
        Tcb {
            name,
            kind,
            entry,
            stack_size: 0,

            org_prio: prio,
            threshold: prio,
            policy: SchedulePolicy::Full,
            task_kind: TaskKind::Basic,

            autostart: false,
            app_mode: 0,
            max_active: 1,
            current_active: 0,
            state: TaskState::Suspended,

            events: 0,
            wait_events: 0,
            set_events: 0,

            external: Vec::new(),
            internal: Vec::new(),
            held: Vec::new(),
            internal_held: false,
            resource_scheduler: false,
        }
    }

    #[inline]
    pub fn is_task(&self) -> bool {
        self.kind == ThreadKind::Task
    }

    #[inline]
    pub fn is_isr(&self) -> bool {
        !self.is_task()
    }

    /// Whether the TCB is bound to a substrate thread
    #[inline]
    pub fn has_thread(&self) -> bool {
        self.kind != ThreadKind::Isr(IsrCategory::Category1)
    }

    #[inline]
    pub fn is_extended(&self) -> bool {
        self.task_kind == TaskKind::Extended
    }

    /// Holds an external resource or `RES_SCHEDULER`
    #[inline]
    pub fn holds_resources(&self) -> bool {
        !self.held.is_empty() || self.resource_scheduler
    }

    /// Drop all run-time state, keeping the static configuration
    pub fn reset(&mut self) {
        self.threshold = self.org_prio;
        self.current_active = 0;
        self.state = TaskState::Suspended;
        self.wait_events = 0;
        self.set_events = 0;
        self.held.clear();
        self.internal_held = false;
        self.resource_scheduler = false;
    }
}
