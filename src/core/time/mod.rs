//! Time management module
//!
//! Counters, the alarms attached to them and the hardware tick entry
//! point.

pub mod alarm;
pub mod counter;

pub use alarm::{Alarm, AlarmAction, AlarmConfig, AlarmMode, AlarmStart, AlarmTiming};
pub use counter::Counter;

use portable_atomic::{AtomicU32, Ordering};

use crate::core::kernel::{Kernel, Phase};
use crate::port::Port;

/// Hardware ticks seen since reset, also the log timestamp
static TICK_COUNT: AtomicU32 = AtomicU32::new(0);

/// Get current tick count
#[inline]
pub fn tick_count() -> u32 {
    TICK_COUNT.load(Ordering::Relaxed)
}

impl<P: Port> Kernel<P> {
    /// Tick handler
    ///
    /// Called from the periodic timer interrupt. Advances the system
    /// counter once the OS runs and fires its expired alarms.
    pub fn tick(&mut self) {
        TICK_COUNT.fetch_add(1, Ordering::Relaxed);

        if self.phase != Phase::Running {
            return;
        }
        if let Some(counter) = self.system_counter {
            self.advance_counter(counter);
        }
    }
}
