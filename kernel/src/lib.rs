//! Process execution core of a small preemptive kernel.
//!
//! Fixed PCB and stack pools, a generic queue engine, a multi-level queue
//! scheduler, the system call layer and the clock tick handler, all owned
//! by one [`Kernel`] value. Everything except the x86_64 glue is plain
//! `no_std` code and is tested on the host.

#![cfg_attr(not(test), no_std)]

pub mod boot;
pub mod config;
pub mod devices;
pub mod interrupts;
pub mod memory;
pub mod process;
pub mod queue;
pub mod syscall;
pub mod system;
pub mod task;
pub mod time;

pub mod arch_impl;
#[cfg(target_arch = "x86_64")]
pub mod logger;
#[cfg(target_arch = "x86_64")]
pub mod serial;

pub use config::KernelConfig;
pub use system::Kernel;
pub use task::NextAction;

#[cfg(target_arch = "x86_64")]
pub fn hlt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

#[cfg(all(target_arch = "x86_64", target_os = "none", not(test)))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    x86_64::instructions::interrupts::disable();
    log::error!("KERNEL PANIC: {}", info);
    hlt_loop()
}
