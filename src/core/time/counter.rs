//! Counters
//!
//! A counter counts ticks of some source, divided by `ticks_per_base`, and
//! wraps to 0 after `max_allowed_value`. One counter may be the system
//! counter, advanced by the hardware tick; the others are advanced with
//! `incr_counter`.

use crate::config::{MAXALLOWEDVALUE, OSEK_MAX_ALARMS, SYSMGR_QUEUE_MSG_COUNT};
use crate::core::kernel::{Kernel, ACTIVATION_LEVELS};
use crate::error::{OsError, OsResult, ServiceId};
use crate::port::Port;
use crate::types::{AlarmBase, AlarmId, CounterId, ExecutionContext, TickType};

/// Counter control block
#[derive(Debug, Clone, Copy)]
pub struct Counter {
    pub name: &'static str,
    pub value: TickType,
    pub base: AlarmBase,
    /// Source ticks since the value last advanced
    pub sub_ticks: TickType,
}

impl Counter {
    /// Advance by one source tick
    ///
    /// Returns `Some(wrapped)` when the value moved.
    pub fn tick(&mut self) -> Option<bool> {
        self.sub_ticks += 1;
        if self.sub_ticks < self.base.ticks_per_base {
            return None;
        }
        self.sub_ticks = 0;

        if self.value >= self.base.max_allowed_value {
            self.value = 0;
            Some(true)
        } else {
            self.value += 1;
            Some(false)
        }
    }
}

impl<P: Port> Kernel<P> {
    /// Create a counter
    ///
    /// # Arguments
    /// * `base` - Maximum value, ticks per increment and minimum alarm cycle
    /// * `start` - Initial value
    ///
    /// # Returns
    /// * `Ok(CounterId)` - Handle of the new counter
    /// * `Err(OsError::InvalidValue)` - `base` or `start` out of range
    /// * `Err(OsError::NameExists)` - Name already used by a counter
    /// * `Err(OsError::NoFreeSlot)` - Counter pool exhausted
    pub fn create_counter(
        &mut self,
        name: &'static str,
        base: AlarmBase,
        start: TickType,
    ) -> OsResult<CounterId> {
        self.require_init()?;

        if base.max_allowed_value == 0
            || base.max_allowed_value > MAXALLOWEDVALUE
            || base.ticks_per_base == 0
            || base.min_cycle == 0
            || base.min_cycle > base.max_allowed_value
            || start > base.max_allowed_value
        {
            return Err(OsError::InvalidValue);
        }
        if self.counters.iter().any(|(_, c)| c.name == name) {
            return Err(OsError::NameExists);
        }

        let index = self.counters.alloc(Counter {
            name,
            value: start,
            base,
            sub_ticks: 0,
        })?;
        crate::info!("counter {=str} created with id {=u8}", name, index);
        Ok(CounterId(index))
    }

    /// Make `counter` the one advanced by [`Kernel::tick`]
    ///
    /// # Returns
    /// * `Err(OsError::InvalidState)` - A system counter is already defined
    pub fn define_system_counter(&mut self, counter: CounterId) -> OsResult<()> {
        self.require_init()?;
        self.counter_base(counter)?;
        if self.system_counter.is_some() {
            return Err(OsError::InvalidState);
        }
        self.system_counter = Some(counter);
        Ok(())
    }

    pub(crate) fn counter_base(&self, counter: CounterId) -> OsResult<AlarmBase> {
        self.counters
            .get(counter.0)
            .map(|c| c.base)
            .ok_or(OsError::InvalidObject)
    }

    /// Current value of a counter
    pub fn get_counter_value(&self, counter: CounterId) -> OsResult<TickType> {
        self.counters
            .get(counter.0)
            .map(|c| c.value)
            .ok_or(OsError::InvalidObject)
    }

    /// Advance a software counter by one tick
    ///
    /// # Returns
    /// * `Err(OsError::InvalidObject)` - Unknown counter, or the system counter
    pub fn incr_counter(&mut self, counter: CounterId) -> OsResult<()> {
        let result = self.require(ACTIVATION_LEVELS).and_then(|_| {
            self.counter_base(counter)?;
            if self.system_counter == Some(counter) {
                return Err(OsError::InvalidObject);
            }
            Ok(())
        });
        if result.is_ok() {
            self.advance_counter(counter);
        }
        self.report(ServiceId::IncrementCounter, counter.0 as u32, result)
    }

    /// Tick a counter at timer level, then let the System Manager handle
    /// what the expired alarms posted
    pub(crate) fn advance_counter(&mut self, counter: CounterId) {
        let saved = self.mode.replace(ExecutionContext::Timer);
        self.counter_tick(counter);
        self.mode = saved;

        if self.mode.is_none() && !self.requests.is_empty() {
            self.run_system_manager();
        }
    }

    fn counter_tick(&mut self, counter: CounterId) {
        let Some(wrapped) = self.counters[counter.0].tick() else {
            return;
        };

        if wrapped {
            for (_, alarm) in self.alarms.iter_mut() {
                if alarm.armed && alarm.counter == counter {
                    alarm.timing.on_wrap();
                }
            }
        }
        self.expire_alarms(counter);
    }

    /// Fire the expired alarms of a counter, deferred ones first
    ///
    /// The per-tick budget counts the requests the firings posted, so a
    /// callback that activates several tasks spends several. Once it is
    /// spent the remaining expired alarms are marked deferred and fire on
    /// the next tick of the counter, in index order.
    fn expire_alarms(&mut self, counter: CounterId) {
        let value = self.counters[counter.0].value;
        let mut fired: u32 = 0;
        let queued = self.requests.len();
        debug_assert!(OSEK_MAX_ALARMS <= 32);

        for deferred_pass in [true, false] {
            for index in 0..self.alarms.len() as u8 {
                let alarm = &self.alarms[index];
                if !alarm.armed || alarm.counter != counter || fired & (1 << index) != 0 {
                    continue;
                }
                let due = if deferred_pass {
                    alarm.deferred
                } else {
                    alarm.timing.expired(value)
                };
                if !due {
                    continue;
                }

                // Callbacks may post any number of requests
                let sent = self.requests.len().saturating_sub(queued);
                if sent >= SYSMGR_QUEUE_MSG_COUNT || self.requests.is_full() {
                    crate::debug!("alarm {=u8} deferred", index);
                    self.alarms[index].deferred = true;
                    continue;
                }

                fired |= 1 << index;
                self.fire_alarm(AlarmId(index));
            }
        }
    }
}
