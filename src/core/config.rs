//! Compile-time configuration for the OSEK layer
//!
//! These constants control priority levels and the static capacity of
//! every object pool.

use crate::types::{Priority, TickType};

// ============ Priorities ============

/// Highest priority a task may be created with
pub const OSEK_MAX_PRIORITY: Priority = 23;

/// Lowest task priority
pub const OSEK_LOWEST_PRIORITY: Priority = 0;

/// Effective priority of a non-preemptable task or a holder of `RES_SCHEDULER`
pub const OSEK_NON_SCHEDULE_PRIORITY: Priority = OSEK_MAX_PRIORITY + 1;

/// Ready level of category 2 interrupt service routines
pub const OSEK_ISR2_PRIORITY: Priority = OSEK_NON_SCHEDULE_PRIORITY + 1;

/// Category 1 routines run above the OS
pub const OSEK_ISR1_PRIORITY: Priority = OSEK_ISR2_PRIORITY + 1;

/// Number of ready queues (one per schedulable level)
pub const OSEK_READY_LEVELS: usize = OSEK_ISR2_PRIORITY as usize + 1;

/// Lowest priority of the underlying thread substrate (0 = highest)
pub const SUBSTRATE_LOWEST_PRIORITY: u8 = 31;

// ============ Pools ============

/// Maximum queued activations per task
pub const OSEK_MAX_ACTIVATION: u8 = 8;

/// Maximum number of tasks, ISRs included
pub const OSEK_MAX_TASKS: usize = 32;

/// Maximum internal resources statically assigned to one task
pub const OSEK_MAX_INTERNAL_RES: usize = 8;

/// Maximum external resources statically assigned to one task
pub const OSEK_MAX_EXTERNAL_RES: usize = 16;

/// Maximum number of resources, `RES_SCHEDULER` included
pub const OSEK_MAX_RES: usize = OSEK_MAX_INTERNAL_RES + OSEK_MAX_EXTERNAL_RES;

/// Maximum number of alarms
pub const OSEK_MAX_ALARMS: usize = 16;

/// Maximum number of counters
pub const OSEK_MAX_COUNTERS: usize = 16;

/// Number of event bits
pub const OSEK_MAX_EVENTS: usize = 32;

/// Maximum number of interrupt service routines
pub const OSEK_MAX_ISR: usize = 8;

/// Depth of one ready queue
///
/// Every task activated to its limit at a single level, plus one slot per
/// task for entries moved between levels by ceiling changes.
pub const TASK_QUEUE_DEPTH: usize =
    OSEK_MAX_ACTIVATION as usize * OSEK_MAX_TASKS + OSEK_MAX_TASKS;

/// Messages a single tick may post to the System Manager
pub const SYSMGR_QUEUE_MSG_COUNT: usize = OSEK_MAX_ALARMS;

/// Capacity of the System Manager channel
pub const SYSMGR_QUEUE_DEPTH: usize = SYSMGR_QUEUE_MSG_COUNT;

// ============ Time ============

/// Largest value a counter may count to
pub const MAXALLOWEDVALUE: TickType = 0x7FFF_FFFF;

// ============ Stacks ============

/// Minimum task stack size in bytes
pub const OSEK_STACK_MIN: usize = 64;

/// Bytes added to every requested stack
pub const OSEK_STACK_PADDING: usize = 128;
