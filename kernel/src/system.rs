//! The kernel context
//!
//! [`Kernel`] owns every piece of process-execution state: the queue
//! engine, the PCB and stack pools, the scheduler, the sleep queue and the
//! clock. Trap handlers take `&mut Kernel`; exclusive access comes from the
//! interrupt model (handlers never nest), not from fine-grained locking.

use crate::config::{KernelConfig, N_PRIOS, N_QNODES, N_QUEUES};
use crate::memory::StackPool;
use crate::process::{Context, Pcb, PcbIndex, ProcessState, ProcessTable};
use crate::queue::{compare_time, Data, Key, QueueEngine, QueueId, QueueOrder};
use crate::task::{NextAction, Scheduler};
use crate::time::Clock;

/// The queue engine instance every kernel list is drawn from.
pub type Queues = QueueEngine<N_QNODES, N_QUEUES>;

pub struct Kernel {
    pub(crate) queues: Queues,
    pub(crate) procs: ProcessTable,
    pub(crate) stacks: StackPool,
    pub(crate) scheduler: Scheduler,
    pub(crate) sleep_queue: Option<QueueId>,
    pub(crate) clock: Clock,
    pub(crate) config: KernelConfig,
}

impl Kernel {
    /// An uninitialized kernel; call [`Kernel::init`] before use.
    pub const fn new(config: KernelConfig) -> Self {
        Self {
            queues: Queues::new(),
            procs: ProcessTable::new(),
            stacks: StackPool::new(),
            scheduler: Scheduler::new(),
            sleep_queue: None,
            clock: Clock::new(),
            config,
        }
    }

    /// Initialize every module in dependency order: queues first, then
    /// PCBs, stacks, scheduler, the syscall layer's sleep queue and the
    /// clock.
    pub fn init(&mut self) {
        log::info!("kernel: initializing process execution core");
        self.queues.init_module();
        self.procs.init(&mut self.queues);
        self.stacks.init(&mut self.queues);
        self.scheduler.init(&mut self.queues);
        self.init_syscalls();
        self.clock.reset();
        log::info!(
            "kernel: {} queue objects and {} nodes still free",
            self.queues.free_queue_count(),
            self.queues.free_node_count()
        );
    }

    fn init_syscalls(&mut self) {
        let sleep = match self.queues.alloc_one(QueueOrder::Ordered(compare_time)) {
            Some(q) => q,
            None => panic!("syscall: no queue object for the sleep queue"),
        };
        self.sleep_queue = Some(sleep);
        log::info!("syscall: sleep queue ready");
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Make `pcb` Ready at the tail of its priority level.
    pub fn schedule(&mut self, pcb: PcbIndex) {
        self.scheduler
            .schedule(&mut self.queues, &mut self.procs, pcb);
    }

    /// Pick the next process to run and make it current.
    pub fn dispatch(&mut self) -> NextAction {
        NextAction::SwitchTo(self.scheduler.dispatch(&mut self.queues, &mut self.procs))
    }

    pub fn current(&self) -> Option<PcbIndex> {
        self.scheduler.current()
    }

    pub fn pcb(&self, pcb: PcbIndex) -> &Pcb {
        self.procs.get(pcb)
    }

    pub fn pcb_mut(&mut self, pcb: PcbIndex) -> &mut Pcb {
        self.procs.get_mut(pcb)
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.procs
    }

    /// Saved register image of a live process.
    pub fn context(&self, pcb: PcbIndex) -> Option<&Context> {
        let stack = self.procs.get(pcb).stack()?;
        Some(&self.stacks.get(stack).context)
    }

    pub fn context_mut(&mut self, pcb: PcbIndex) -> Option<&mut Context> {
        let stack = self.procs.get(pcb).stack()?;
        Some(&mut self.stacks.get_mut(stack).context)
    }

    /// Raw pointer to the saved context, for the interrupt stubs.
    pub fn context_ptr(&mut self, pcb: PcbIndex) -> Option<*mut Context> {
        self.context_mut(pcb).map(|ctx| ctx as *mut Context)
    }

    /// Write a syscall return value into `pcb`'s saved RAX.
    pub fn set_return(&mut self, pcb: PcbIndex, value: i64) {
        match self.context_mut(pcb) {
            Some(ctx) => ctx.set_return(value),
            None => log::warn!("kernel: return value for PCB {} without a stack", pcb.as_usize()),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.clock.now()
    }

    pub fn active_processes(&self) -> usize {
        self.procs.active()
    }

    /// PCBs waiting at priority `level`, head first.
    pub fn ready_at(&self, level: usize) -> impl Iterator<Item = PcbIndex> + '_ {
        self.queues
            .iter(self.scheduler.ready_queue(level))
            .map(|(_, data)| PcbIndex::from_usize(data))
    }

    /// Sleeping PCBs with their wakeup ticks, earliest first.
    pub fn sleepers(&self) -> impl Iterator<Item = (Key, PcbIndex)> + '_ {
        self.queues
            .iter(self.sleep_queue())
            .map(|(key, data)| (key, PcbIndex::from_usize(data)))
    }

    pub fn free_pcb_count(&self) -> usize {
        self.procs.free_count(&self.queues)
    }

    pub fn free_stack_count(&self) -> usize {
        self.stacks.free_count(&self.queues)
    }

    pub fn free_node_count(&self) -> usize {
        self.queues.free_node_count()
    }

    pub(crate) fn sleep_queue(&self) -> QueueId {
        match self.sleep_queue {
            Some(q) => q,
            None => panic!("syscall: sleep queue used before init"),
        }
    }

    /// Log every kernel queue.
    pub fn dump_queues(&self) {
        for level in 0..N_PRIOS {
            self.queues.dump("ready", self.scheduler.ready_queue(level));
        }
        self.queues.dump("sleep", self.sleep_queue());
    }

    /// Check the global process invariants:
    ///
    /// - the live counter equals the number of non-Free PCBs
    /// - at most one PCB is Running, and it is the current one
    /// - a PCB is in the MLQ exactly once iff it is Ready, and in the sleep
    ///   queue exactly once iff it is Sleeping
    /// - every live PCB owns a stack, every free one does not
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        let mut live = 0;
        let mut running = 0;
        for (index, pcb) in self.procs.iter() {
            if pcb.is_free() {
                if pcb.stack().is_some() {
                    return Err("free PCB holds a stack");
                }
                if self.queued_in_mlq(index) + self.queued_sleeping(index) != 0 {
                    return Err("free PCB still queued");
                }
                continue;
            }
            live += 1;
            if pcb.stack().is_none() {
                return Err("live PCB without a stack");
            }

            let in_ready = self.queued_in_mlq(index);
            let in_sleep = self.queued_sleeping(index);
            match pcb.state {
                ProcessState::Ready => {
                    if in_ready != 1 || in_sleep != 0 {
                        return Err("Ready PCB not in exactly one ready queue");
                    }
                    if !self
                        .queues
                        .contains(self.scheduler.ready_queue(pcb.priority as usize), index.as_usize())
                    {
                        return Err("Ready PCB queued at the wrong priority");
                    }
                }
                ProcessState::Sleeping => {
                    if in_sleep != 1 || in_ready != 0 {
                        return Err("Sleeping PCB not in exactly one sleep entry");
                    }
                }
                ProcessState::Running => {
                    running += 1;
                    if self.current() != Some(index) {
                        return Err("Running PCB is not current");
                    }
                    if in_ready + in_sleep != 0 {
                        return Err("Running PCB still queued");
                    }
                }
                _ => {
                    if in_ready + in_sleep != 0 {
                        return Err("queued PCB in a non-queued state");
                    }
                }
            }
        }
        if live != self.procs.active() {
            return Err("live counter disagrees with PCB states");
        }
        if running > 1 {
            return Err("more than one Running PCB");
        }
        if let Some(cur) = self.current() {
            if self.procs.get(cur).state != ProcessState::Running {
                return Err("current PCB is not Running");
            }
        }
        Ok(())
    }

    fn queued_in_mlq(&self, pcb: PcbIndex) -> usize {
        (0..N_PRIOS)
            .map(|level| self.count_in(self.scheduler.ready_queue(level), pcb.as_usize()))
            .sum()
    }

    fn queued_sleeping(&self, pcb: PcbIndex) -> usize {
        self.count_in(self.sleep_queue(), pcb.as_usize())
    }

    fn count_in(&self, queue: QueueId, data: Data) -> usize {
        self.queues.iter(queue).filter(|&(_, d)| d == data).count()
    }
}
