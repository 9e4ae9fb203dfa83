//! Process creation and teardown.

use super::{pcb_dump, Context, PcbIndex, ProcessError, ProcessState};
use crate::system::Kernel;

impl Kernel {
    /// Create a process that starts executing at `entry` with priority
    /// `prio`.
    ///
    /// On success the PCB is New and owns a fresh stack whose context is
    /// ready for dispatch; the caller must [`Kernel::schedule`] it. On
    /// failure nothing is leaked.
    pub fn create_process(&mut self, entry: u64, prio: u8) -> Result<PcbIndex, ProcessError> {
        let pcb = self.procs.alloc(&mut self.queues).ok_or_else(|| {
            log::warn!("create_process: {}", ProcessError::NoFreePcb);
            ProcessError::NoFreePcb
        })?;

        let stack = match self.stacks.alloc(&mut self.queues) {
            Some(stack) => stack,
            None => {
                log::warn!("create_process: {}", ProcessError::NoFreeStack);
                self.procs.dealloc(&mut self.queues, pcb);
                return Err(ProcessError::NoFreeStack);
            }
        };

        let trampoline = self.config.exit_trampoline;
        let s = self.stacks.get_mut(&stack);
        s.return_address = trampoline;
        s.sentinel = 0;
        s.context = Context::new(entry, s.return_address_slot());

        let pid = self.procs.allocate_pid();
        let default_quantum = self.config.default_quantum;
        let p = self.procs.get_mut(pcb);
        p.pid = pid;
        p.ppid = super::Pid::NONE;
        p.priority = prio;
        p.default_quantum = default_quantum;
        p.quantum = default_quantum;
        p.stack = Some(stack);

        log::info!("process: created pid {} at {:#x}, prio {}", pid, entry, prio);
        pcb_dump("new", p);
        Ok(pcb)
    }

    /// Tear down `pcb`: unlink it from the ready or sleep queue if it is
    /// waiting in one, then release its stack and the PCB itself.
    ///
    /// Destroying the current process leaves the CPU without one; the
    /// caller must [`Kernel::dispatch`] before the next tick.
    pub fn destroy_process(&mut self, pcb: PcbIndex) {
        if self.current() == Some(pcb) {
            self.scheduler.clear_current();
        }
        let p = self.procs.get(pcb);
        let pid = p.pid;
        match p.state {
            ProcessState::Ready => {
                let level = self.scheduler.ready_queue(p.priority as usize);
                self.queues.remove_entry(level, pcb.as_usize());
            }
            ProcessState::Sleeping => {
                let sleep = self.sleep_queue();
                self.queues.remove_entry(sleep, pcb.as_usize());
            }
            _ => {}
        }

        if let Some(stack) = self.procs.dealloc(&mut self.queues, pcb) {
            self.stacks.dealloc(&mut self.queues, stack);
        }
        log::info!("process: pid {} destroyed", pid);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{KernelConfig, N_PCBS, PID_INIT, PRIO_USER_STD};
    use crate::process::{Pid, ProcessError, ProcessState};
    use crate::system::Kernel;
    use crate::task::NextAction;

    fn kernel() -> Kernel {
        let mut kernel = Kernel::new(KernelConfig {
            default_quantum: 5,
            exit_trampoline: 0xdead_0000,
        });
        kernel.init();
        kernel
    }

    #[test]
    fn test_create_initializes_pcb_and_context() {
        let mut k = kernel();
        let idx = k.create_process(0x40_1000, PRIO_USER_STD).unwrap();
        let pcb = k.pcb(idx);
        assert_eq!(pcb.pid, Pid::new(PID_INIT));
        assert_eq!(pcb.ppid, Pid::NONE);
        assert_eq!(pcb.state, ProcessState::New);
        assert_eq!(pcb.default_quantum, 5);
        assert_eq!(pcb.priority, PRIO_USER_STD);

        let ctx = *k.context(idx).unwrap();
        assert_eq!(ctx.rip, 0x40_1000);
        assert_eq!(ctx.rflags, 0x202);
        let stack = k.stacks.get(k.pcb(idx).stack().unwrap());
        assert_eq!(ctx.rsp, stack.return_address_slot());
        assert_eq!(stack.return_address, 0xdead_0000);
        assert_eq!(stack.sentinel, 0);
        assert_eq!(k.active_processes(), 1);
    }

    #[test]
    fn test_pids_increase() {
        let mut k = kernel();
        let a = k.create_process(0x1000, 1).unwrap();
        let b = k.create_process(0x1000, 1).unwrap();
        assert!(k.pcb(b).pid > k.pcb(a).pid);
    }

    #[test]
    fn test_create_fails_when_pcbs_exhausted() {
        let mut k = kernel();
        for _ in 0..N_PCBS {
            k.create_process(0x1000, 1).unwrap();
        }
        let stacks_before = k.free_stack_count();
        assert_eq!(k.create_process(0x1000, 1), Err(ProcessError::NoFreePcb));
        assert_eq!(k.free_stack_count(), stacks_before);
        assert_eq!(k.active_processes(), N_PCBS);
    }

    #[test]
    fn test_stack_failure_releases_pcb() {
        let mut k = kernel();
        let mut held = std::vec::Vec::new();
        while let Some(s) = k.stacks.alloc(&mut k.queues) {
            held.push(s);
        }
        let pcbs_before = k.free_pcb_count();
        assert_eq!(k.create_process(0x1000, 1), Err(ProcessError::NoFreeStack));
        assert_eq!(k.free_pcb_count(), pcbs_before);
        assert_eq!(k.active_processes(), 0);
        for s in held {
            k.stacks.dealloc(&mut k.queues, s);
        }
    }

    #[test]
    fn test_destroy_unlinks_ready_and_sleeping() {
        let mut k = kernel();
        let ready = k.create_process(0x1000, 2).unwrap();
        k.schedule(ready);
        let sleeper = k.create_process(0x2000, 2).unwrap();
        k.pcb_mut(sleeper).state = ProcessState::Sleeping;
        let sleep = k.sleep_queue();
        k.queues.insert(sleep, sleeper.as_usize(), 50);
        assert_eq!(k.check_invariants(), Ok(()));

        let nodes = k.free_node_count();
        k.destroy_process(ready);
        k.destroy_process(sleeper);
        assert_eq!(k.ready_at(2).count(), 0);
        assert_eq!(k.sleepers().count(), 0);
        assert_eq!(k.active_processes(), 0);
        // Two queue entries gone, two PCB and two stack free entries back.
        assert_eq!(k.free_node_count(), nodes + 2 - 4);
        assert_eq!(k.check_invariants(), Ok(()));
    }

    #[test]
    fn test_destroy_current_is_never_dispatched_again() {
        let mut k = kernel();
        let a = k.create_process(0x1000, 1).unwrap();
        let b = k.create_process(0x2000, 2).unwrap();
        k.schedule(a);
        k.schedule(b);
        assert_eq!(k.dispatch(), NextAction::SwitchTo(a));

        k.destroy_process(a);
        assert_eq!(k.current(), None);
        assert_eq!(k.check_invariants(), Ok(()));

        assert_eq!(k.clock_tick(), NextAction::Continue);
        assert!(k.pcb(a).is_free());
        assert_eq!(k.ready_at(1).count(), 0);
        assert_eq!(k.dispatch(), NextAction::SwitchTo(b));
        assert_eq!(k.free_pcb_count(), N_PCBS - 1);
        assert_eq!(k.check_invariants(), Ok(()));
    }
}
