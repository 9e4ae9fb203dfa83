//! PCB pool
//!
//! Free PCBs are kept on a FIFO free queue. `alloc` pops one and marks it
//! New; `dealloc` wipes it back to Free and pushes it again. The table also
//! owns pid assignment and the live-process counter.

use super::{Pcb, PcbIndex, Pid, ProcessState};
use crate::config::{N_PCBS, PID_INIT};
use crate::memory::StackIndex;
use crate::queue::{QueueId, QueueOrder};
use crate::system::Queues;

pub struct ProcessTable {
    pcbs: [Pcb; N_PCBS],
    free: Option<QueueId>,
    active: usize,
    next_pid: u16,
}

impl ProcessTable {
    pub const fn new() -> Self {
        Self {
            pcbs: [Pcb::EMPTY; N_PCBS],
            free: None,
            active: 0,
            next_pid: PID_INIT,
        }
    }

    /// Module initialization: every PCB is cleared and pushed onto the
    /// free queue.
    pub fn init(&mut self, queues: &mut Queues) {
        let free = match queues.alloc_one(QueueOrder::Fifo) {
            Some(q) => q,
            None => panic!("pcb: no queue object for the free PCB list"),
        };
        self.free = Some(free);
        for (i, pcb) in self.pcbs.iter_mut().enumerate() {
            *pcb = Pcb::EMPTY;
            queues.insert(free, i, 0);
        }
        self.active = 0;
        self.next_pid = PID_INIT;
        log::info!("pcb: {} PCBs", N_PCBS);
    }

    /// Take a PCB from the pool; state becomes New.
    pub fn alloc(&mut self, queues: &mut Queues) -> Option<PcbIndex> {
        let free = self.free_queue();
        let index = queues.remove(free)?;
        let pcb = &mut self.pcbs[index];
        *pcb = Pcb::EMPTY;
        pcb.state = ProcessState::New;
        self.active += 1;
        Some(PcbIndex(index))
    }

    /// Return a PCB to the pool.
    ///
    /// The record is wiped and the stack token it held, if any, is handed
    /// back for the caller to release. Freeing a PCB that is already Free
    /// is ignored.
    pub fn dealloc(&mut self, queues: &mut Queues, index: PcbIndex) -> Option<StackIndex> {
        let free = self.free_queue();
        let pcb = &mut self.pcbs[index.0];
        if pcb.is_free() {
            log::warn!("pcb: dealloc of free PCB {}", index.0);
            return None;
        }
        let stack = pcb.stack.take();
        *pcb = Pcb::EMPTY;
        queues.insert(free, index.0, 0);
        self.active -= 1;
        stack
    }

    /// Locate the live PCB holding `pid`.
    pub fn find(&self, pid: Pid) -> Option<PcbIndex> {
        if pid.is_none() {
            return None;
        }
        self.pcbs
            .iter()
            .position(|p| !p.is_free() && p.pid == pid)
            .map(PcbIndex)
    }

    /// Next pid. Wraps around the 16-bit range, skipping 0 and pids still
    /// held by live processes.
    pub fn allocate_pid(&mut self) -> Pid {
        loop {
            let candidate = Pid(self.next_pid);
            self.next_pid = match self.next_pid.wrapping_add(1) {
                0 => 1,
                n => n,
            };
            if self.find(candidate).is_none() {
                return candidate;
            }
        }
    }

    pub fn get(&self, index: PcbIndex) -> &Pcb {
        &self.pcbs[index.0]
    }

    pub fn get_mut(&mut self, index: PcbIndex) -> &mut Pcb {
        &mut self.pcbs[index.0]
    }

    /// Non-Free PCBs.
    pub fn active(&self) -> usize {
        self.active
    }

    pub fn free_count(&self, queues: &Queues) -> usize {
        self.free.map_or(0, |q| queues.len(q))
    }

    /// All slots, free ones included.
    pub fn iter(&self) -> impl Iterator<Item = (PcbIndex, &Pcb)> {
        self.pcbs.iter().enumerate().map(|(i, p)| (PcbIndex(i), p))
    }

    #[cfg(test)]
    pub(crate) fn set_next_pid(&mut self, pid: u16) {
        self.next_pid = pid;
    }

    fn free_queue(&self) -> QueueId {
        match self.free {
            Some(q) => q,
            None => panic!("pcb: table used before init"),
        }
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> (Queues, ProcessTable) {
        let mut queues = Queues::new();
        queues.init_module();
        let mut procs = ProcessTable::new();
        procs.init(&mut queues);
        (queues, procs)
    }

    #[test]
    fn test_alloc_marks_new_and_counts() {
        let (mut queues, mut procs) = table();
        let idx = procs.alloc(&mut queues).unwrap();
        assert_eq!(procs.get(idx).state, ProcessState::New);
        assert_eq!(procs.active(), 1);
        assert_eq!(procs.free_count(&queues), N_PCBS - 1);
    }

    #[test]
    fn test_dealloc_round_trip() {
        let (mut queues, mut procs) = table();
        let free_before = procs.free_count(&queues);
        let nodes_before = queues.free_node_count();

        let idx = procs.alloc(&mut queues).unwrap();
        procs.get_mut(idx).pid = Pid::new(5);
        procs.get_mut(idx).priority = 2;
        assert!(procs.dealloc(&mut queues, idx).is_none());

        assert_eq!(procs.free_count(&queues), free_before);
        assert_eq!(queues.free_node_count(), nodes_before);
        assert_eq!(procs.active(), 0);
        let pcb = procs.get(idx);
        assert!(pcb.is_free());
        assert_eq!(pcb.pid, Pid::NONE);
        assert_eq!(pcb.priority, 0);
    }

    #[test]
    fn test_double_dealloc_is_ignored() {
        let (mut queues, mut procs) = table();
        let idx = procs.alloc(&mut queues).unwrap();
        procs.dealloc(&mut queues, idx);
        procs.dealloc(&mut queues, idx);
        assert_eq!(procs.free_count(&queues), N_PCBS);
        assert_eq!(procs.active(), 0);
    }

    #[test]
    fn test_find_skips_free_slots() {
        let (mut queues, mut procs) = table();
        let idx = procs.alloc(&mut queues).unwrap();
        let pid = procs.allocate_pid();
        procs.get_mut(idx).pid = pid;
        assert_eq!(procs.find(pid), Some(idx));
        assert_eq!(procs.find(Pid::NONE), None);

        procs.dealloc(&mut queues, idx);
        assert_eq!(procs.find(pid), None);
    }

    #[test]
    fn test_exhaustion() {
        let (mut queues, mut procs) = table();
        for _ in 0..N_PCBS {
            assert!(procs.alloc(&mut queues).is_some());
        }
        assert!(procs.alloc(&mut queues).is_none());
        assert_eq!(procs.active(), N_PCBS);
    }

    #[test]
    fn test_pid_wrap_skips_zero_and_live_pids() {
        let (mut queues, mut procs) = table();
        assert_eq!(procs.allocate_pid(), Pid::new(PID_INIT));

        let idx = procs.alloc(&mut queues).unwrap();
        procs.get_mut(idx).pid = Pid::new(1);

        procs.set_next_pid(u16::MAX);
        assert_eq!(procs.allocate_pid(), Pid::new(u16::MAX));
        // 0 is skipped and 1 is still live.
        assert_eq!(procs.allocate_pid(), Pid::new(2));
    }
}
