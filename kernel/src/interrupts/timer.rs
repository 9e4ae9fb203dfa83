//! Clock tick handler
//!
//! On every timer interrupt:
//! 1. Advance system time
//! 2. Wake every sleeper whose wakeup tick has come, earliest first
//! 3. Charge one tick to the current process and preempt it when its
//!    quantum runs out
//!
//! Woken processes are scheduled before the preempted one goes back into
//! the MLQ, so they run ahead of it within the same level.

use crate::system::Kernel;
use crate::task::NextAction;

/// Ticks between queue dumps with the `dump_queues` feature.
const DUMP_INTERVAL: u64 = 10 * crate::config::CLOCK_FREQUENCY;

impl Kernel {
    pub fn clock_tick(&mut self) -> NextAction {
        let now = self.clock.tick();

        let sleep = self.sleep_queue();
        while let Some(wakeup) = self.queues.peek_key(sleep) {
            if wakeup > now {
                break;
            }
            if let Some(index) = self.queues.remove(sleep) {
                let pcb = crate::process::PcbIndex::from_usize(index);
                log::debug!("clock: wake pid {} at {}", self.pcb(pcb).pid, now);
                self.schedule(pcb);
            }
        }

        if cfg!(feature = "dump_queues") && now % DUMP_INTERVAL == 0 {
            log::info!("clock: queue dump at tick {}", now);
            self.dump_queues();
            #[cfg(target_arch = "x86_64")]
            crate::serial::dump_input();
        }

        let Some(current) = self.current() else {
            return NextAction::Continue;
        };
        let p = self.pcb_mut(current);
        p.quantum = p.quantum.saturating_sub(1);
        if p.quantum > 0 {
            return NextAction::Continue;
        }

        log::debug!("clock: pid {} quantum expired", p.pid);
        self.schedule(current);
        self.dispatch()
    }
}
