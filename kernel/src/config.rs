//! Compile-time sizing of the kernel pools and runtime tunables.
//!
//! Every pool in the process execution core is carved once at boot from the
//! constants below; nothing grows afterwards.

/// Maximum number of user processes.
pub const N_PROCS: usize = 25;

/// PCB pool size, one extra slot for the idle process.
pub const N_PCBS: usize = N_PROCS + 1;

/// One stack per PCB.
pub const N_STACKS: usize = N_PROCS + 1;

/// Queue objects: the queue free list, the MLQ levels, the sleep queue and
/// the PCB/stack free lists, plus spares.
pub const N_QUEUES: usize = 10;

/// Shared queue node pool.
pub const N_QNODES: usize = N_PCBS + N_STACKS + N_QUEUES + 3;

/// Number of MLQ levels.
pub const N_PRIOS: usize = 4;

/// Size of every process stack in 64-bit words.
pub const STACK_QUADS: usize = 1024;

/// Timer interrupts per second.
pub const CLOCK_FREQUENCY: u64 = 1000;

/// Default quantum, in ticks.
pub const QUANTUM_DEFAULT: u32 = 10;

/// Number of real system calls.
pub const N_SYSCALLS: usize = 7;

pub const PRIO_SYSTEM: u8 = 0;
pub const PRIO_USER_HIGH: u8 = 1;
pub const PRIO_USER_STD: u8 = 2;
pub const PRIO_USER_LOW: u8 = 3;

pub const PRIO_DEFAULT: u8 = PRIO_USER_STD;
pub const PRIO_LAST: u8 = PRIO_USER_LOW;

/// First pid handed out; the init process gets it.
pub const PID_INIT: u16 = 1;

const _: () = assert!(PRIO_LAST as usize == N_PRIOS - 1);

/// Runtime configuration handed to [`crate::system::Kernel::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Quantum every newly created process starts with.
    pub default_quantum: u32,
    /// Address a process "returns" into when its entry function returns
    /// without calling exit. Written into the fake return address slot of
    /// every new stack.
    pub exit_trampoline: u64,
}

impl KernelConfig {
    pub const DEFAULT: KernelConfig = KernelConfig {
        default_quantum: QUANTUM_DEFAULT,
        exit_trampoline: 0,
    };
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
