//! Panic and fault handlers for bare-metal builds
//!
//! Host builds use the standard library's handlers.

#[cfg(all(feature = "defmt", target_arch = "arm"))]
use defmt_rtt as _;

// Prints the panic message over RTT
#[cfg(all(feature = "defmt", target_arch = "arm"))]
use panic_probe as _;

#[cfg(all(feature = "defmt", target_arch = "arm"))]
#[defmt::panic_handler]
fn defmt_panic() -> ! {
    cortex_m::asm::udf()
}

#[cfg(all(not(feature = "defmt"), target_arch = "arm"))]
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::bkpt();
    }
}

// A fault inside a task or ISR body is not recoverable by the scheduler
#[cfg(target_arch = "arm")]
#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    crate::error!("hard fault, pc {=u32:#x} lr {=u32:#x}", ef.pc(), ef.lr());
    loop {
        cortex_m::asm::udf();
    }
}

// Log timestamps count hardware ticks
#[cfg(all(feature = "defmt", target_arch = "arm"))]
defmt::timestamp!("{=u32}", crate::core::time::tick_count());
