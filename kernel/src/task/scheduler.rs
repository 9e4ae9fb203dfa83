//! Multi-level queue scheduler
//!
//! One FIFO ready queue per priority level; level 0 is the highest. Within
//! a level processes run round-robin, and the quantum decides how long one
//! may keep the CPU before the clock handler sends it back to the tail of
//! its level.

use crate::config::{N_PRIOS, PRIO_LAST};
use crate::process::{PcbIndex, ProcessState, ProcessTable};
use crate::queue::{QueueId, QueueOrder};
use crate::system::Queues;

/// What the trap driver must do once a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Resume the process that trapped.
    Continue,
    /// A scheduling decision was made; resume this process instead.
    SwitchTo(PcbIndex),
}

pub struct Scheduler {
    /// Ready queues, indexed by priority
    ready: [Option<QueueId>; N_PRIOS],
    /// PCB that owns the CPU
    current: Option<PcbIndex>,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            ready: [None; N_PRIOS],
            current: None,
        }
    }

    /// Reserve the MLQ levels. Running short of queue objects here is fatal.
    pub fn init(&mut self, queues: &mut Queues) {
        let mut ids = [QueueId::from_raw(0); N_PRIOS];
        let got = queues.alloc(&mut ids);
        if got != N_PRIOS {
            panic!("sched: wanted {} ready queues, got {}", N_PRIOS, got);
        }
        for (slot, id) in self.ready.iter_mut().zip(ids) {
            queues.init(id, QueueOrder::Fifo);
            *slot = Some(id);
        }
        self.current = None;
        log::info!("sched: {} priority levels", N_PRIOS);
    }

    /// Make `pcb` Ready at the tail of its priority level.
    ///
    /// An out-of-range priority is clamped to the lowest level. The caller
    /// must already have unlinked `pcb` from any other queue.
    pub fn schedule(&mut self, queues: &mut Queues, procs: &mut ProcessTable, pcb: PcbIndex) {
        let p = procs.get_mut(pcb);
        if p.priority as usize >= N_PRIOS {
            log::debug!("sched: pid {} prio {} clamped", p.pid, p.priority);
            p.priority = PRIO_LAST;
        }
        p.state = ProcessState::Ready;
        let level = self.ready_queue(p.priority as usize);
        queues.insert(level, pcb.as_usize(), 0);
        log::debug!("sched: pid {} ready at prio {}", p.pid, p.priority);
    }

    /// Select the next process: head of the highest non-empty level.
    ///
    /// The selected PCB becomes Running with a fresh quantum. An empty MLQ
    /// is fatal, since the idle process is always runnable.
    pub fn dispatch(&mut self, queues: &mut Queues, procs: &mut ProcessTable) -> PcbIndex {
        for level in 0..N_PRIOS {
            let q = self.ready_queue(level);
            if let Some(index) = queues.remove(q) {
                let pcb = PcbIndex::from_usize(index);
                let p = procs.get_mut(pcb);
                p.state = ProcessState::Running;
                p.quantum = p.default_quantum;
                self.current = Some(pcb);
                log::debug!("sched: dispatch pid {} (prio {})", p.pid, level);
                return pcb;
            }
        }
        log::error!("sched: no ready processes");
        panic!("dispatch: no ready processes");
    }

    pub fn current(&self) -> Option<PcbIndex> {
        self.current
    }

    /// Forget the current process; used when it exits.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// Queue backing priority `level`.
    pub fn ready_queue(&self, level: usize) -> QueueId {
        match self.ready[level] {
            Some(q) => q,
            None => panic!("sched: ready queue {} used before init", level),
        }
    }

    /// Total processes waiting in the MLQ.
    pub fn ready_count(&self, queues: &Queues) -> usize {
        self.ready.iter().flatten().map(|&q| queues.len(q)).sum()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
