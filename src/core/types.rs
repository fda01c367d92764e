//! Core type definitions for the OSEK layer
//!
//! Object handles are plain indices into the kernel pools. Tasks and ISRs
//! share one thread pool and are told apart by the tag kept in the
//! control block, so a `TaskId` naming an ISR slot is rejected at the
//! service boundary.

/// Task priority (larger is more urgent)
pub type Priority = u8;

/// Counter tick type
pub type TickType = u32;

/// Event bitmask
pub type EventMask = u32;

/// Application mode bitmask
pub type AppMode = u32;

/// OSEK status code as returned to C-style callers
pub type StatusType = u8;

/// Interrupt masking state, see [`crate::Kernel::get_interrupt_descriptor`]
pub type InterruptMask = u32;

/// `DisableAllInterrupts` or `DisableInterrupt` in effect
pub const INT_ALL_DISABLED: InterruptMask = 1 << 0;
/// `SuspendAllInterrupts` in effect
pub const INT_ALL_SUSPENDED: InterruptMask = 1 << 1;
/// `SuspendOSInterrupts` in effect
pub const INT_OS_SUSPENDED: InterruptMask = 1 << 2;

/// Default application mode
pub const OSDEFAULTAPPMODE: AppMode = 1;

/// Successful status
pub const E_OK: StatusType = 0;

// ============ Handles ============

/// Index of a thread control block (task or ISR)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThreadId(pub u8);

/// Handle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId(pub u8);

/// Handle of an interrupt service routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IsrId(pub u8);

/// Handle of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResourceId(pub u8);

/// Handle of a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CounterId(pub u8);

/// Handle of an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmId(pub u8);

/// Resource every task may take to lock out all other tasks
pub const RES_SCHEDULER: ResourceId = ResourceId(0);

impl ThreadId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TaskId {
    /// Thread slot backing this task
    #[inline(always)]
    pub fn thread(self) -> ThreadId {
        ThreadId(self.0)
    }
}

impl IsrId {
    /// Thread slot backing this ISR
    #[inline(always)]
    pub fn thread(self) -> ThreadId {
        ThreadId(self.0)
    }
}

// ============ States and kinds ============

/// Task state as reported by `get_task_state`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TaskState {
    Running = 0,
    Waiting = 1,
    Ready = 2,
    Suspended = 3,
}

/// Scheduling policy of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulePolicy {
    /// Preemptable by any higher priority task
    Full,
    /// Runs at the non-preemptable level until it yields
    Non,
}

/// Conformance kind of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TaskKind {
    Basic = 0,
    /// May wait on events
    Extended = 1,
}

/// Resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResourceKind {
    Standard,
    /// Taken on dispatch and released on termination, wait or yield
    Internal,
    /// Alias of another resource
    Linked(ResourceId),
}

/// Interrupt service routine category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IsrCategory {
    /// Runs synchronously, may not call OS services
    Category1 = 1,
    /// Runs as a thread at the ISR2 ready level
    Category2 = 2,
}

/// Level the caller of a service is executing at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ExecutionContext {
    Task = 0,
    StartupHook = 1,
    ShutdownHook = 2,
    PreTaskHook = 3,
    PostTaskHook = 4,
    ErrorHook = 5,
    Isr1 = 6,
    Isr2 = 7,
    Timer = 8,
    InitSystem = 9,
    AlarmCallback = 10,
    /// Running, but no OSEK thread is current
    Idle = 11,
}

impl ExecutionContext {
    /// Whether a hook routine is executing
    #[inline]
    pub fn is_hook(self) -> bool {
        matches!(
            self,
            Self::StartupHook
                | Self::ShutdownHook
                | Self::PreTaskHook
                | Self::PostTaskHook
                | Self::ErrorHook
        )
    }
}

/// Static characteristics of a counter, as returned by `get_alarm_base`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmBase {
    pub max_allowed_value: TickType,
    pub ticks_per_base: TickType,
    pub min_cycle: TickType,
}
