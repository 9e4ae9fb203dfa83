//! Process management
//!
//! A process is a PCB from the fixed [`ProcessTable`] plus the stack it
//! owns for its whole non-Free lifetime. The saved [`context::Context`]
//! lives at the top of that stack.

pub mod context;
pub mod creation;
pub mod table;

use crate::memory::StackIndex;

pub use context::Context;
pub use table::ProcessTable;

/// Process ID type; 0 is never assigned and means "no process".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u16);

impl Pid {
    pub const NONE: Pid = Pid(0);

    pub const fn new(id: u16) -> Self {
        Pid(id)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl core::fmt::Display for Pid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slot of a PCB in the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PcbIndex(usize);

impl PcbIndex {
    pub const fn as_usize(self) -> usize {
        self.0
    }

    pub(crate) const fn from_usize(index: usize) -> Self {
        PcbIndex(index)
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Slot is in the free pool
    Free,
    /// Allocated, not yet scheduled
    New,
    /// Waiting in an MLQ level
    Ready,
    /// Owns the CPU
    Running,
    /// Waiting in the sleep queue
    Sleeping,
    /// Reserved for blocking I/O
    Blocked,
}

impl ProcessState {
    /// Numeric code reported by the process-info syscall.
    pub const fn code(self) -> u64 {
        match self {
            ProcessState::Free => 0,
            ProcessState::New => 1,
            ProcessState::Ready => 2,
            ProcessState::Running => 3,
            ProcessState::Sleeping => 4,
            ProcessState::Blocked => 5,
        }
    }
}

/// Process control block
#[derive(Debug)]
pub struct Pcb {
    pub pid: Pid,
    /// Creator's pid, `Pid::NONE` for processes started by the kernel
    pub ppid: Pid,
    pub state: ProcessState,
    /// MLQ level, 0 is the highest priority
    pub priority: u8,
    /// Ticks left in the current dispatch
    pub quantum: u32,
    /// Quantum restored on every dispatch
    pub default_quantum: u32,
    /// Absolute wakeup tick, meaningful only while Sleeping
    pub wakeup: u64,
    pub(crate) stack: Option<StackIndex>,
}

impl Pcb {
    pub const EMPTY: Pcb = Pcb {
        pid: Pid::NONE,
        ppid: Pid::NONE,
        state: ProcessState::Free,
        priority: 0,
        quantum: 0,
        default_quantum: 0,
        wakeup: 0,
        stack: None,
    };

    pub fn is_free(&self) -> bool {
        self.state == ProcessState::Free
    }

    pub fn stack(&self) -> Option<&StackIndex> {
        self.stack.as_ref()
    }
}

/// Why process creation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    NoFreePcb,
    NoFreeStack,
}

impl core::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProcessError::NoFreePcb => f.write_str("no free PCB"),
            ProcessError::NoFreeStack => f.write_str("no free stack"),
        }
    }
}

/// Log a PCB at debug level.
pub fn pcb_dump(label: &str, pcb: &Pcb) {
    log::debug!(
        "{}: pid {} ppid {} state {:?} prio {} quantum {}/{} wakeup {} stack {:?}",
        label,
        pcb.pid,
        pcb.ppid,
        pcb.state,
        pcb.priority,
        pcb.quantum,
        pcb.default_quantum,
        pcb.wakeup,
        pcb.stack.as_ref().map(|s| s.as_usize())
    );
}
