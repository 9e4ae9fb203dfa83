//! x86_64 trap driver.
//!
//! The assembly interrupt stubs (outside this crate) save the trapped
//! registers into the current process's [`Context`], call one of the
//! `isr_*` entry points below, and restore whichever context the entry
//! point returns before executing `iretq`. All scheduling decisions are
//! made by the [`Kernel`] handlers; this module only applies their
//! [`NextAction`].

use spin::Mutex;

use crate::config::KernelConfig;
use crate::devices::Devices;
use crate::interrupts::{end_of_interrupt, InterruptIndex};
use crate::process::Context;
use crate::serial::{self, Com, SerialDevice};
use crate::system::Kernel;
use crate::task::NextAction;

/// The kernel instance. Handlers never nest, so the lock is never
/// contended once boot has released it.
pub static KERNEL: Mutex<Kernel> = Mutex::new(Kernel::new(KernelConfig::DEFAULT));

/// Context the stub must restore after `action`.
fn resume(kernel: &mut Kernel, action: NextAction) -> *mut Context {
    let next = match action {
        NextAction::Continue => kernel.current(),
        NextAction::SwitchTo(pcb) => Some(pcb),
    };
    match next.and_then(|pcb| kernel.context_ptr(pcb)) {
        Some(ctx) => ctx,
        None => panic!("trap: no process to resume"),
    }
}

#[no_mangle]
pub extern "C" fn isr_timer() -> *mut Context {
    let mut kernel = KERNEL.lock();
    let action = kernel.clock_tick();
    let ctx = resume(&mut kernel, action);
    end_of_interrupt(InterruptIndex::Timer);
    ctx
}

#[no_mangle]
pub extern "C" fn isr_syscall() -> *mut Context {
    let mut console = SerialDevice::new(Com::Com1);
    let mut sio = SerialDevice::new(Com::Com2);
    let mut devices = Devices::new(&mut console, &mut sio);

    let mut kernel = KERNEL.lock();
    let action = kernel.handle_syscall(&mut devices);
    resume(&mut kernel, action)
}

/// Serial receive interrupt; `com` is 1 or 2.
#[no_mangle]
pub extern "C" fn isr_serial(com: u8) -> *mut Context {
    let (com, index) = match com {
        2 => (Com::Com2, InterruptIndex::Com2),
        _ => (Com::Com1, InterruptIndex::Com1),
    };
    serial::drain_receiver(com);
    end_of_interrupt(index);

    let mut kernel = KERNEL.lock();
    resume(&mut kernel, NextAction::Continue)
}

/// Body of the idle process.
pub extern "C" fn idle_main() -> ! {
    crate::hlt_loop()
}
