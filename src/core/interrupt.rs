//! Interrupt service routines and interrupt masking
//!
//! Category 1 ISRs run on the interrupted stack and may not use OS
//! services. Category 2 ISRs are threads above every task level: the
//! board's interrupt handler calls [`Kernel::process_isr`], which activates
//! the ISR thread through the System Manager.
//!
//! The masking services only gate what the OS lets run. While any of them
//! is in effect, activated category 2 ISRs stay pending in the ready
//! queues; category 1 ISRs are held back by `DisableAllInterrupts` and
//! `SuspendAllInterrupts`.

use crate::config::{
    OSEK_ISR1_PRIORITY, OSEK_ISR2_PRIORITY, OSEK_MAX_ACTIVATION, OSEK_MAX_ISR, OSEK_STACK_MIN,
    OSEK_STACK_PADDING,
};
use crate::core::kernel::{Kernel, Phase};
use crate::core::sysmgr::Request;
use crate::core::task::{Tcb, ThreadKind};
use crate::error::{OsError, OsResult, ServiceId};
use crate::port::{Port, ThreadEntry};
use crate::prio::substrate_priority;
use crate::types::{
    ExecutionContext, InterruptMask, IsrCategory, IsrId, ThreadId, INT_ALL_DISABLED,
    INT_ALL_SUSPENDED, INT_OS_SUSPENDED,
};

/// Static description of an ISR
#[derive(Debug, Clone, Copy)]
pub struct IsrConfig {
    pub name: &'static str,
    pub entry: ThreadEntry,
    pub category: IsrCategory,
    /// Stack size in bytes for category 2, before padding
    pub stack_size: usize,
}

impl IsrConfig {
    pub const fn new(name: &'static str, entry: ThreadEntry, category: IsrCategory) -> Self {
        IsrConfig {
            name,
            entry,
            category,
            stack_size: 512,
        }
    }

    pub const fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }
}

impl<P: Port> Kernel<P> {
    /// Create an ISR
    ///
    /// # Returns
    /// * `Ok(IsrId)` - Handle of the new ISR
    /// * `Err(OsError::NoFreeSlot)` - ISR or thread pool exhausted
    /// * `Err(OsError::NameExists)` - Another task or ISR has this name
    /// * `Err(OsError::InvalidValue)` - Stack too small
    pub fn create_isr(&mut self, config: IsrConfig) -> OsResult<IsrId> {
        self.require_init()?;

        if self.isr_count as usize >= OSEK_MAX_ISR || self.tasks.is_full() {
            return Err(OsError::NoFreeSlot);
        }
        if self.thread_named(config.name).is_some() {
            return Err(OsError::NameExists);
        }

        let thread = ThreadId(self.tasks.len() as u8);
        let (prio, stack_size) = match config.category {
            IsrCategory::Category1 => (OSEK_ISR1_PRIORITY, 0),
            IsrCategory::Category2 => {
                if config.stack_size < OSEK_STACK_MIN {
                    return Err(OsError::InvalidValue);
                }
                let stack_size = config.stack_size + OSEK_STACK_PADDING;
                self.port
                    .thread_create(
                        thread,
                        config.entry,
                        substrate_priority(OSEK_ISR2_PRIORITY),
                        stack_size,
                    )
                    .map_err(|_| OsError::System)?;
                (OSEK_ISR2_PRIORITY, stack_size)
            }
        };

        let mut tcb = Tcb::new(
            config.name,
            ThreadKind::Isr(config.category),
            config.entry,
            prio,
        );
        tcb.stack_size = stack_size;
        tcb.max_active = OSEK_MAX_ACTIVATION;
        let index = self.tasks.alloc(tcb)?;
        self.isr_count += 1;

        crate::info!("ISR {=str} created with id {=u8}", config.name, index);
        Ok(IsrId(index))
    }

    /// Look an ISR up by name
    pub fn isr_named(&self, name: &str) -> Option<IsrId> {
        self.thread_named(name)
            .filter(|t| self.tasks[t.0].is_isr())
            .map(|t| IsrId(t.0))
    }

    /// Entry point for the board's interrupt handlers
    ///
    /// A category 1 ISR runs right here unless all interrupts are masked,
    /// in which case it runs when they are unmasked. A category 2 ISR is
    /// activated like a task.
    ///
    /// # Returns
    /// * `Err(OsError::WrongCallContext)` - OS not running
    /// * `Err(OsError::InvalidObject)` - Not an ISR handle
    /// * `Err(OsError::ActivationLimitExceeded)` - Too many pending activations
    /// * `Err(OsError::ListFull)` - System Manager channel full
    pub fn process_isr(&mut self, isr: IsrId) -> OsResult<()> {
        let result = self.enter_isr(isr);
        self.report(ServiceId::ProcessIsr, isr.0 as u32, result)
    }

    fn enter_isr(&mut self, isr: IsrId) -> OsResult<()> {
        if self.phase != Phase::Running {
            return Err(OsError::WrongCallContext);
        }
        let thread = self.isr_thread(isr)?;

        if self.tasks[thread.0].kind == ThreadKind::Isr(IsrCategory::Category1) {
            if self.all_masked() {
                self.tasks[thread.0].current_active = 1;
            } else {
                self.run_isr1(thread);
            }
            return Ok(());
        }

        let tcb = &self.tasks[thread.0];
        if tcb.current_active >= tcb.max_active {
            return Err(OsError::ActivationLimitExceeded);
        }
        self.reserve_request()?;
        self.arm_activation(thread);
        self.submit(Request::Activate(thread));
        Ok(())
    }

    fn run_isr1(&mut self, thread: ThreadId) {
        let entry = self.tasks[thread.0].entry;
        self.run_hook(ExecutionContext::Isr1, |_| entry());
    }

    fn run_pending_isr1(&mut self) {
        for index in 0..self.tasks.len() as u8 {
            let tcb = &mut self.tasks[index];
            if tcb.kind == ThreadKind::Isr(IsrCategory::Category1) && tcb.current_active > 0 {
                tcb.current_active = 0;
                self.run_isr1(ThreadId(index));
            }
        }
    }

    // ============ Masking ============

    /// Whether any masking service is in effect
    #[inline]
    pub(crate) fn interrupts_suspended(&self) -> bool {
        let state = &self.interrupts;
        state.all_disabled || state.all_nest > 0 || state.os_nest > 0
    }

    #[inline]
    fn all_masked(&self) -> bool {
        self.interrupts.all_disabled || self.interrupts.all_nest > 0
    }

    fn enter_masked(&mut self, was_suspended: bool) {
        if !was_suspended {
            self.port.interrupts_disable();
        }
    }

    fn leave_masked(&mut self) {
        if !self.all_masked() {
            self.run_pending_isr1();
        }
        if self.interrupts_suspended() {
            return;
        }
        self.port.interrupts_enable();
        if self.phase == Phase::Running {
            self.submit(Request::Dispatch);
        }
    }

    /// Mask all interrupts; does not nest
    pub fn disable_all_interrupts(&mut self) {
        if self.interrupts.all_disabled {
            crate::warn!("{} ignored, already disabled", ServiceId::DisableAllInterrupts);
            return;
        }
        let was = self.interrupts_suspended();
        self.interrupts.all_disabled = true;
        self.enter_masked(was);
    }

    /// Undo [`Kernel::disable_all_interrupts`]
    pub fn enable_all_interrupts(&mut self) {
        if !self.interrupts.all_disabled {
            crate::warn!("{} ignored, not disabled", ServiceId::EnableAllInterrupts);
            return;
        }
        self.interrupts.all_disabled = false;
        self.leave_masked();
    }

    /// Mask all interrupts, nestable
    pub fn suspend_all_interrupts(&mut self) {
        let was = self.interrupts_suspended();
        self.interrupts.all_nest = self.interrupts.all_nest.saturating_add(1);
        self.enter_masked(was);
    }

    pub fn resume_all_interrupts(&mut self) {
        if self.interrupts.all_nest == 0 {
            crate::warn!("{} ignored, not suspended", ServiceId::ResumeAllInterrupts);
            return;
        }
        self.interrupts.all_nest -= 1;
        self.leave_masked();
    }

    /// Mask category 2 interrupts, nestable
    pub fn suspend_os_interrupts(&mut self) {
        let was = self.interrupts_suspended();
        self.interrupts.os_nest = self.interrupts.os_nest.saturating_add(1);
        self.enter_masked(was);
    }

    pub fn resume_os_interrupts(&mut self) {
        if self.interrupts.os_nest == 0 {
            crate::warn!("{} ignored, not suspended", ServiceId::ResumeOsInterrupts);
            return;
        }
        self.interrupts.os_nest -= 1;
        self.leave_masked();
    }

    /// Status-returning form of [`Kernel::disable_all_interrupts`]
    ///
    /// # Returns
    /// * `Err(OsError::InvalidState)` - Already disabled
    pub fn disable_interrupt(&mut self) -> OsResult<()> {
        let result = if self.interrupts.all_disabled {
            Err(OsError::InvalidState)
        } else {
            self.disable_all_interrupts();
            Ok(())
        };
        self.report(ServiceId::DisableInterrupt, 0, result)
    }

    /// Status-returning form of [`Kernel::enable_all_interrupts`]
    ///
    /// # Returns
    /// * `Err(OsError::InvalidState)` - Not disabled
    pub fn enable_interrupt(&mut self) -> OsResult<()> {
        let result = if self.interrupts.all_disabled {
            self.enable_all_interrupts();
            Ok(())
        } else {
            Err(OsError::InvalidState)
        };
        self.report(ServiceId::EnableInterrupt, 0, result)
    }

    /// Which masking services are in effect, as `INT_*` bits
    pub fn get_interrupt_descriptor(&self) -> InterruptMask {
        let state = &self.interrupts;
        let mut mask = 0;
        if state.all_disabled {
            mask |= INT_ALL_DISABLED;
        }
        if state.all_nest > 0 {
            mask |= INT_ALL_SUSPENDED;
        }
        if state.os_nest > 0 {
            mask |= INT_OS_SUSPENDED;
        }
        mask
    }
}
