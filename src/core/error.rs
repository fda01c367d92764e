//! Error types for the OSEK layer
//!
//! Service violations are ordinary `Result` errors. Broken scheduler
//! invariants are `FatalError`s and never return.

use crate::types::StatusType;

// ============ Status codes ============

pub const E_OS_ACCESS: StatusType = 1;
pub const E_OS_CALLEVEL: StatusType = 2;
pub const E_OS_ID: StatusType = 3;
pub const E_OS_LIMIT: StatusType = 4;
pub const E_OS_NOFUNC: StatusType = 5;
pub const E_OS_RESOURCE: StatusType = 6;
pub const E_OS_STATE: StatusType = 7;
pub const E_OS_VALUE: StatusType = 8;
pub const E_OS_EVENT: StatusType = 9;
pub const E_OS_EXIST: StatusType = 10;
pub const E_OS_SYSTEM: StatusType = 11;
pub const E_OS_SYS_STACK: StatusType = 12;

/// Service error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OsError {
    // ============ Object errors ============
    /// Handle does not name an object of the expected kind
    InvalidObject,
    /// Object pool exhausted
    NoFreeSlot,
    /// Static list of the owning object is full
    ListFull,
    /// An object with the same name already exists
    NameExists,
    /// All event bits are allocated
    NoFreeEvent,

    // ============ Task errors ============
    /// Task already has its maximum number of pending activations
    ActivationLimitExceeded,
    /// Task still occupies a resource
    ResourceStillHeld,
    /// Task kind does not allow the operation (basic task, no events)
    CapabilityMissing,

    // ============ Resource errors ============
    /// Resource is held by someone
    AlreadyOccupied,
    /// Resource is not assigned to the caller
    NotRegistered,
    /// Release does not match the last acquisition
    NotInOrder,
    /// Resource is not held by the caller
    NotOccupied,

    // ============ Context errors ============
    /// Service called from a level that may not use it
    WrongCallContext,

    // ============ State errors ============
    /// Object is in the wrong state for the operation
    InvalidState,
    /// Parameter out of range
    InvalidValue,
    /// Alarm is not armed
    NotArmed,

    // ============ System errors ============
    /// Substrate failure outside the run phase
    System,
}

/// Result type alias for OSEK services
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    /// OSEK status code of the error
    pub fn status(self) -> StatusType {
        match self {
            OsError::InvalidObject => E_OS_ID,
            OsError::NoFreeSlot => E_OS_SYS_STACK,
            OsError::ListFull | OsError::ActivationLimitExceeded => E_OS_LIMIT,
            OsError::NameExists => E_OS_EXIST,
            OsError::NoFreeEvent => E_OS_EVENT,
            OsError::ResourceStillHeld => E_OS_RESOURCE,
            OsError::AlreadyOccupied | OsError::NotRegistered | OsError::CapabilityMissing => {
                E_OS_ACCESS
            }
            OsError::NotInOrder | OsError::NotOccupied | OsError::NotArmed => E_OS_NOFUNC,
            OsError::WrongCallContext => E_OS_CALLEVEL,
            OsError::InvalidState => E_OS_STATE,
            OsError::InvalidValue => E_OS_VALUE,
            OsError::System => E_OS_SYSTEM,
        }
    }
}

// ============ Fatal errors ============

/// Internal fault after which the scheduler cannot continue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FatalError {
    ObjectCreation = 1,
    ThreadResume = 2,
    PreemptionChangeGet = 3,
    PreemptionChangeRelease = 4,
    ThreadTerminate = 5,
    ThreadDelete = 9,
    PreemptionChange = 11,
    SysmgrFatal = 21,
    TaskEndingWithoutChainOrTerminate = 27,
    SysmgrQueueSend = 28,
    SysmgrStartOs = 30,
    ThreadSuspend = 33,
    ReadyQueueOverflow = 34,
    CorruptedObject = 35,
}

impl FatalError {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

// ============ Error hook information ============

/// Service that detected an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ServiceId {
    ActivateTask = 1,
    TerminateTask = 2,
    ChainTask = 3,
    Schedule = 4,
    GetTaskId = 5,
    GetTaskState = 6,
    DisableAllInterrupts = 7,
    EnableAllInterrupts = 8,
    SuspendAllInterrupts = 9,
    ResumeAllInterrupts = 10,
    SuspendOsInterrupts = 11,
    ResumeOsInterrupts = 12,
    GetResource = 13,
    ReleaseResource = 14,
    SetEvent = 15,
    ClearEvent = 16,
    GetEvent = 17,
    WaitEvent = 18,
    GetAlarmBase = 19,
    GetAlarm = 20,
    SetRelAlarm = 21,
    SetAbsAlarm = 22,
    CancelAlarm = 23,
    GetActiveApplicationMode = 24,
    StartOs = 25,
    ShutdownOs = 26,
    IncrementCounter = 27,
    ProcessIsr = 28,
    DisableInterrupt = 29,
    EnableInterrupt = 30,
}

/// What the error hook is told about a failed service call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorInfo {
    pub service: ServiceId,
    pub error: OsError,
    /// First object parameter of the call (task, resource, alarm id or mask)
    pub param: u32,
}
