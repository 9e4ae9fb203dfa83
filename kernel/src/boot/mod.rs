//! Bring-up
//!
//! [`start_processes`] creates the two processes the system always has
//! (`init` at the highest priority, `idle` at the lowest, never exiting)
//! and makes the first dispatch. On x86_64, [`init`] does the hardware
//! bring-up around it and hands the first context to the boot stub.

use crate::config::{PRIO_SYSTEM, PRIO_USER_LOW};
use crate::process::PcbIndex;
use crate::system::Kernel;
use crate::task::NextAction;

/// Create and schedule `init` and `idle`, then dispatch. Returns the
/// process to run first. Failure to create either is fatal.
pub fn start_processes(kernel: &mut Kernel, init_entry: u64, idle_entry: u64) -> PcbIndex {
    let init = match kernel.create_process(init_entry, PRIO_SYSTEM) {
        Ok(pcb) => pcb,
        Err(e) => panic!("boot: cannot create init process: {}", e),
    };
    let idle = match kernel.create_process(idle_entry, PRIO_USER_LOW) {
        Ok(pcb) => pcb,
        Err(e) => panic!("boot: cannot create idle process: {}", e),
    };
    kernel.schedule(init);
    kernel.schedule(idle);

    match kernel.dispatch() {
        NextAction::SwitchTo(first) => {
            log::info!("boot: first process is pid {}", kernel.pcb(first).pid);
            first
        }
        NextAction::Continue => panic!("boot: dispatch made no selection"),
    }
}

#[cfg(target_arch = "x86_64")]
pub use self::x86_64::init;

#[cfg(target_arch = "x86_64")]
mod x86_64 {
    use super::start_processes;
    use crate::arch_impl::x86_64::{idle_main, KERNEL};
    use crate::config::KernelConfig;
    use crate::process::Context;
    use crate::{interrupts, logger, serial};

    /// Boot the process execution core.
    ///
    /// Returns the saved context of the first process; the boot stub loads
    /// it and executes `iretq`, which also enables interrupts.
    pub fn init(config: KernelConfig, init_entry: u64) -> *mut Context {
        logger::init_early();
        serial::init();
        logger::serial_ready();

        #[cfg(all(target_os = "none", not(test)))]
        crate::memory::heap::init();
        serial::init_input();

        let mut kernel = KERNEL.lock();
        kernel.config = config;
        kernel.init();

        let first = start_processes(&mut kernel, init_entry, idle_main as usize as u64);
        let ctx = match kernel.context_ptr(first) {
            Some(ctx) => ctx,
            None => panic!("boot: first process has no context"),
        };
        drop(kernel);

        interrupts::init_pic();
        interrupts::init_pit();
        log::info!("boot: kernel ready");
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::process::{Pid, ProcessState};

    #[test]
    fn test_init_runs_first_and_idle_waits() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel.init();
        let first = start_processes(&mut kernel, 0x1000, 0x2000);

        assert_eq!(kernel.pcb(first).pid, Pid::new(1));
        assert_eq!(kernel.pcb(first).priority, PRIO_SYSTEM);
        assert_eq!(kernel.pcb(first).state, ProcessState::Running);
        let idle: std::vec::Vec<_> = kernel.ready_at(PRIO_USER_LOW as usize).collect();
        assert_eq!(idle.len(), 1);
        assert_eq!(kernel.context(idle[0]).unwrap().rip, 0x2000);
        assert_eq!(kernel.check_invariants(), Ok(()));
    }
}
