//! Alarms
//!
//! An alarm is attached to one counter and fires when the counter reaches
//! its expiry value. Firing either activates a task, sets events of a task
//! or calls a routine at alarm callback level. Cyclic alarms rearm from
//! their previous expiry, so deferred or late firings never accumulate
//! drift.

use crate::core::kernel::{Kernel, ALARM_LEVELS};
use crate::error::{OsError, OsResult, ServiceId};
use crate::port::Port;
use crate::types::{
    AlarmBase, AlarmId, AppMode, CounterId, EventMask, ExecutionContext, TaskId, TickType,
    OSDEFAULTAPPMODE,
};

// ============ Expiry arithmetic ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmMode {
    Relative,
    Absolute,
}

/// Expiry bookkeeping of an armed alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTiming {
    pub mode: AlarmMode,
    /// Counter value at which the alarm expires
    pub expiry: TickType,
    /// 0 for a single shot
    pub cycle: TickType,
    /// The counter wrapped since the alarm was armed
    pub rollback: bool,
    /// A relative expiry beyond the counter maximum was folded back and
    /// may only match after the next wrap
    pub awaiting_wrap: bool,
}

impl AlarmTiming {
    pub const fn idle() -> Self {
        AlarmTiming {
            mode: AlarmMode::Relative,
            expiry: 0,
            cycle: 0,
            rollback: false,
            awaiting_wrap: false,
        }
    }

    /// Expire `increment` ticks after `value`
    pub fn arm_relative(value: TickType, increment: TickType, cycle: TickType, max: TickType) -> Self {
        let mut timing = AlarmTiming {
            cycle,
            ..AlarmTiming::idle()
        };
        timing.advance(value, increment, max);
        timing
    }

    /// Expire when the counter reaches `start`
    pub fn arm_absolute(start: TickType, cycle: TickType) -> Self {
        AlarmTiming {
            mode: AlarmMode::Absolute,
            expiry: start,
            cycle,
            rollback: false,
            awaiting_wrap: false,
        }
    }

    fn advance(&mut self, from: TickType, increment: TickType, max: TickType) {
        let span = max as u64 + 1;
        let target = from as u64 + increment as u64;
        self.mode = AlarmMode::Relative;
        self.rollback = false;
        self.awaiting_wrap = target >= span;
        self.expiry = (target % span) as TickType;
    }

    /// Counter wrapped to 0
    pub fn on_wrap(&mut self) {
        self.rollback = true;
        self.awaiting_wrap = false;
    }

    pub fn expired(&self, value: TickType) -> bool {
        match self.mode {
            AlarmMode::Relative => !self.awaiting_wrap && value >= self.expiry,
            AlarmMode::Absolute => {
                value == self.expiry || (value > self.expiry && self.rollback)
            }
        }
    }

    /// Schedule the next period of a cyclic alarm
    pub fn rearm(&mut self, max: TickType) {
        let from = self.expiry;
        self.advance(from, self.cycle, max);
    }

    /// Ticks left until expiry
    pub fn remaining(&self, value: TickType, max: TickType) -> TickType {
        let wraps = match self.mode {
            AlarmMode::Relative => self.awaiting_wrap,
            AlarmMode::Absolute => self.expiry <= value,
        };
        if wraps {
            max - value + 1 + self.expiry
        } else {
            self.expiry.saturating_sub(value)
        }
    }
}

// ============ Configuration ============

/// What an alarm does when it expires
pub enum AlarmAction<P: Port> {
    ActivateTask(TaskId),
    SetEvent(TaskId, EventMask),
    /// Called at alarm callback level; may only activate tasks and set events
    Callback(fn(&mut Kernel<P>)),
}

impl<P: Port> Clone for AlarmAction<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: Port> Copy for AlarmAction<P> {}

/// Arming applied by `start_os`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmStart {
    Relative { increment: TickType, cycle: TickType },
    Absolute { start: TickType, cycle: TickType },
}

/// Static description of an alarm
///
/// # Example
/// ```ignore
/// let id = kernel.create_alarm(
///     AlarmConfig::new("Sample", counter, AlarmAction::ActivateTask(task))
///         .autostart(AlarmStart::Relative { increment: 10, cycle: 10 }),
/// )?;
/// ```
pub struct AlarmConfig<P: Port> {
    pub name: &'static str,
    pub counter: CounterId,
    pub action: AlarmAction<P>,
    pub autostart: Option<AlarmStart>,
    /// Application modes the autostart applies to
    pub app_mode: AppMode,
}

impl<P: Port> AlarmConfig<P> {
    pub const fn new(name: &'static str, counter: CounterId, action: AlarmAction<P>) -> Self {
        AlarmConfig {
            name,
            counter,
            action,
            autostart: None,
            app_mode: OSDEFAULTAPPMODE,
        }
    }

    pub const fn autostart(mut self, start: AlarmStart) -> Self {
        self.autostart = Some(start);
        self
    }

    pub const fn app_mode(mut self, mode: AppMode) -> Self {
        self.app_mode = mode;
        self
    }
}

/// Alarm control block
pub struct Alarm<P: Port> {
    pub name: &'static str,
    pub counter: CounterId,
    pub action: AlarmAction<P>,
    pub autostart: Option<AlarmStart>,
    pub app_mode: AppMode,
    pub armed: bool,
    /// Expired while the tick's message budget was spent
    pub deferred: bool,
    pub timing: AlarmTiming,
}

impl<P: Port> Alarm<P> {
    #[inline]
    pub fn disarm(&mut self) {
        self.armed = false;
        self.deferred = false;
    }
}

// ============ Services ============

impl<P: Port> Kernel<P> {
    /// Create an alarm
    ///
    /// # Returns
    /// * `Ok(AlarmId)` - Handle of the new alarm
    /// * `Err(OsError::InvalidObject)` - Unknown counter or target task
    /// * `Err(OsError::CapabilityMissing)` - Event target is a basic task
    /// * `Err(OsError::InvalidValue)` - Autostart values out of range
    /// * `Err(OsError::NoFreeSlot)` - Alarm pool exhausted
    pub fn create_alarm(&mut self, config: AlarmConfig<P>) -> OsResult<AlarmId> {
        self.require_init()?;

        if self.alarms.iter().any(|(_, a)| a.name == config.name) {
            return Err(OsError::NameExists);
        }
        let base = self.counter_base(config.counter)?;

        match config.action {
            AlarmAction::ActivateTask(task) => {
                self.task_thread(task)?;
            }
            AlarmAction::SetEvent(task, mask) => {
                let thread = self.task_thread(task)?;
                if !self.tasks[thread.0].is_extended() {
                    return Err(OsError::CapabilityMissing);
                }
                if mask == 0 {
                    return Err(OsError::InvalidValue);
                }
            }
            AlarmAction::Callback(_) => {}
        }

        match config.autostart {
            Some(AlarmStart::Relative { increment, cycle }) => {
                check_increment(&base, increment)?;
                check_cycle(&base, cycle)?;
            }
            Some(AlarmStart::Absolute { start, cycle }) => {
                check_start(&base, start)?;
                check_cycle(&base, cycle)?;
            }
            None => {}
        }

        let index = self.alarms.alloc(Alarm {
            name: config.name,
            counter: config.counter,
            action: config.action,
            autostart: config.autostart,
            app_mode: config.app_mode,
            armed: false,
            deferred: false,
            timing: AlarmTiming::idle(),
        })?;

        crate::info!("alarm {=str} created with id {=u8}", config.name, index);
        Ok(AlarmId(index))
    }

    /// Arm the autostart alarms of the active application mode
    pub(crate) fn start_alarms(&mut self) {
        let mode = self.app_mode;
        for index in 0..self.alarms.len() as u8 {
            let alarm = &self.alarms[index];
            if alarm.app_mode & mode == 0 {
                continue;
            }
            let Some(start) = alarm.autostart else {
                continue;
            };
            let counter = &self.counters[alarm.counter.0];
            let timing = match start {
                AlarmStart::Relative { increment, cycle } => AlarmTiming::arm_relative(
                    counter.value,
                    increment,
                    cycle,
                    counter.base.max_allowed_value,
                ),
                AlarmStart::Absolute { start, cycle } => AlarmTiming::arm_absolute(start, cycle),
            };

            let alarm = &mut self.alarms[index];
            alarm.timing = timing;
            alarm.armed = true;
            alarm.deferred = false;
        }
    }

    fn alarm_ref(&self, alarm: AlarmId) -> OsResult<&Alarm<P>> {
        self.alarms.get(alarm.0).ok_or(OsError::InvalidObject)
    }

    /// Constants of the counter an alarm is attached to
    pub fn get_alarm_base(&mut self, alarm: AlarmId) -> OsResult<AlarmBase> {
        let result = self
            .alarm_ref(alarm)
            .and_then(|a| self.counter_base(a.counter));
        self.report(ServiceId::GetAlarmBase, alarm.0 as u32, result)
    }

    /// Ticks left before an armed alarm expires
    ///
    /// # Returns
    /// * `Err(OsError::NotArmed)` - Alarm is not in use
    pub fn get_alarm(&mut self, alarm: AlarmId) -> OsResult<TickType> {
        let result = self.require(ALARM_LEVELS).and_then(|_| {
            let a = self.alarm_ref(alarm)?;
            if !a.armed {
                return Err(OsError::NotArmed);
            }
            let counter = &self.counters[a.counter.0];
            Ok(a
                .timing
                .remaining(counter.value, counter.base.max_allowed_value))
        });
        self.report(ServiceId::GetAlarm, alarm.0 as u32, result)
    }

    /// Arm an alarm `increment` ticks from now
    ///
    /// # Arguments
    /// * `increment` - Ticks until the first expiry, `1..=max_allowed_value`
    /// * `cycle` - 0 for a single shot, otherwise `min_cycle..=max_allowed_value`
    ///
    /// # Returns
    /// * `Err(OsError::InvalidState)` - Alarm already armed
    /// * `Err(OsError::InvalidValue)` - Increment or cycle out of range
    pub fn set_rel_alarm(&mut self, alarm: AlarmId, increment: TickType, cycle: TickType) -> OsResult<()> {
        let result = self.prepare_arm(alarm).and_then(|base| {
            check_increment(&base, increment)?;
            check_cycle(&base, cycle)?;
            let counter = self.alarms[alarm.0].counter;
            let value = self.counters[counter.0].value;
            Ok(AlarmTiming::arm_relative(
                value,
                increment,
                cycle,
                base.max_allowed_value,
            ))
        });
        let result = result.map(|timing| self.arm(alarm, timing));
        self.report(ServiceId::SetRelAlarm, alarm.0 as u32, result)
    }

    /// Arm an alarm to expire when its counter reaches `start`
    ///
    /// A `start` equal to the current value expires after a full counter
    /// period.
    pub fn set_abs_alarm(&mut self, alarm: AlarmId, start: TickType, cycle: TickType) -> OsResult<()> {
        let result = self.prepare_arm(alarm).and_then(|base| {
            check_start(&base, start)?;
            check_cycle(&base, cycle)?;
            Ok(AlarmTiming::arm_absolute(start, cycle))
        });
        let result = result.map(|timing| self.arm(alarm, timing));
        self.report(ServiceId::SetAbsAlarm, alarm.0 as u32, result)
    }

    fn prepare_arm(&self, alarm: AlarmId) -> OsResult<AlarmBase> {
        self.require(ALARM_LEVELS)?;
        let a = self.alarm_ref(alarm)?;
        if a.armed {
            return Err(OsError::InvalidState);
        }
        self.counter_base(a.counter)
    }

    fn arm(&mut self, alarm: AlarmId, timing: AlarmTiming) {
        let a = &mut self.alarms[alarm.0];
        a.timing = timing;
        a.armed = true;
        a.deferred = false;
        crate::trace!("alarm {=u8} armed, expiry {=u32}", alarm.0, timing.expiry);
    }

    /// Disarm an alarm
    ///
    /// A callback already running is not interrupted.
    ///
    /// # Returns
    /// * `Err(OsError::NotArmed)` - Alarm is not in use
    pub fn cancel_alarm(&mut self, alarm: AlarmId) -> OsResult<()> {
        let result = self.require(ALARM_LEVELS).and_then(|_| {
            let a = self.alarms.get_mut(alarm.0).ok_or(OsError::InvalidObject)?;
            if !a.armed {
                return Err(OsError::NotArmed);
            }
            a.disarm();
            Ok(())
        });
        self.report(ServiceId::CancelAlarm, alarm.0 as u32, result)
    }

    /// Look an alarm up by name
    pub fn alarm_named(&self, name: &str) -> Option<AlarmId> {
        self.alarms
            .iter()
            .find(|(_, a)| a.name == name)
            .map(|(index, _)| AlarmId(index))
    }

    /// Run the action of an expired alarm
    ///
    /// Errors of the action are reported like any service error.
    pub(crate) fn fire_alarm(&mut self, alarm: AlarmId) {
        let counter = self.alarms[alarm.0].counter;
        let max = self.counters[counter.0].base.max_allowed_value;

        let a = &mut self.alarms[alarm.0];
        a.deferred = false;
        if a.timing.cycle > 0 {
            a.timing.rearm(max);
        } else {
            a.armed = false;
        }
        let action = a.action;
        crate::trace!("alarm {=u8} expired", alarm.0);

        match action {
            AlarmAction::ActivateTask(task) => {
                let _ = self.activate_task(task);
            }
            AlarmAction::SetEvent(task, mask) => {
                let _ = self.set_event(task, mask);
            }
            AlarmAction::Callback(callback) => {
                self.run_hook(ExecutionContext::AlarmCallback, |k| callback(k));
            }
        }
    }
}

fn check_increment(base: &AlarmBase, increment: TickType) -> OsResult<()> {
    if increment == 0 || increment > base.max_allowed_value {
        return Err(OsError::InvalidValue);
    }
    Ok(())
}

fn check_start(base: &AlarmBase, start: TickType) -> OsResult<()> {
    if start > base.max_allowed_value {
        return Err(OsError::InvalidValue);
    }
    Ok(())
}

fn check_cycle(base: &AlarmBase, cycle: TickType) -> OsResult<()> {
    if cycle != 0 && (cycle < base.min_cycle || cycle > base.max_allowed_value) {
        return Err(OsError::InvalidValue);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: TickType = 1000;

    #[test]
    fn test_relative_expiry() {
        let t = AlarmTiming::arm_relative(5, 3, 0, MAX);
        assert_eq!(t.expiry, 8);
        assert!(!t.expired(7));
        assert!(t.expired(8));
        assert_eq!(t.remaining(5, MAX), 3);
    }

    #[test]
    fn test_relative_across_wrap() {
        let mut t = AlarmTiming::arm_relative(995, 10, 0, MAX);
        assert_eq!(t.expiry, 4);
        assert!(t.awaiting_wrap);
        assert!(!t.expired(998));
        assert_eq!(t.remaining(995, MAX), 10);

        t.on_wrap();
        assert!(!t.expired(3));
        assert!(t.expired(4));
    }

    #[test]
    fn test_absolute_needs_rollback_when_passed() {
        let mut t = AlarmTiming::arm_absolute(50, 0);
        assert!(!t.expired(100));
        assert!(t.expired(50));
        assert_eq!(t.remaining(100, MAX), 951);

        t.on_wrap();
        assert!(t.expired(100));
    }

    #[test]
    fn test_cyclic_rearm_has_no_drift() {
        let mut t = AlarmTiming::arm_relative(0, 10, 10, MAX);
        for n in 1..=250u32 {
            let expected = (n * 10) % (MAX + 1);
            assert_eq!(t.expiry, expected);
            t.rearm(MAX);
            if t.awaiting_wrap {
                t.on_wrap();
            }
        }
    }

    #[test]
    fn test_absolute_cycle_continues_relative() {
        let mut t = AlarmTiming::arm_absolute(990, 20);
        t.rearm(MAX);
        assert_eq!(t.mode, AlarmMode::Relative);
        assert_eq!(t.expiry, 9);
        assert!(t.awaiting_wrap);
    }
}
