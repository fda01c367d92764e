//! Cortex-M4 port helpers
//!
//! Tick source, interrupt masking and the fatal halt loop. A board port
//! implements [`crate::Port`] on top of its thread substrate and drives
//! the kernel from its SysTick handler:
//!
//! ```ignore
//! static OS: Os<BoardPort> = Os::new();
//!
//! #[cortex_m_rt::exception]
//! fn SysTick() {
//!     let _ = OS.with(|kernel| kernel.tick());
//! }
//! ```

use cortex_m::peripheral::syst::SystClkSource;

use crate::error::FatalError;

/// Initialize SysTick timer for system tick generation
///
/// # Arguments
/// * `cnts` - Reload value
///
/// # Example
/// For 16MHz clock with 1000Hz tick rate: cnts = 16_000_000 / 1000 = 16_000
pub fn systick_init(cnts: u32) {
    let mut p = unsafe { cortex_m::Peripherals::steal() };

    p.SYST.set_reload(cnts - 1);
    p.SYST.clear_current();
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.enable_interrupt();
    p.SYST.enable_counter();
}

#[inline(always)]
pub fn interrupts_disable() {
    cortex_m::interrupt::disable();
}

#[inline(always)]
pub fn interrupts_enable() {
    unsafe { cortex_m::interrupt::enable() };
}

/// Park the CPU with interrupts off so a debugger or watchdog can catch it
pub fn halt(error: FatalError) -> ! {
    crate::error!("OSEK fatal error {=u8}", error.code());
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::bkpt();
    }
}
