//! System call interface
//!
//! A process traps with the syscall number in RAX and up to three arguments
//! in RDI, RSI and RDX. The result goes back in the saved RAX of the
//! caller's context; there is no other return channel.

pub mod dispatcher;
pub mod handlers;
pub mod userptr;

use crate::config::N_SYSCALLS;

/// System call numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SyscallNumber {
    Exit = 0,
    SpawnP = 1,
    Sleep = 2,
    Read = 3,
    Write = 4,
    GetProcessInfo = 5,
    GetSystemInfo = 6,
}

impl SyscallNumber {
    /// Try to convert a u64 to a SyscallNumber
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Exit),
            1 => Some(Self::SpawnP),
            2 => Some(Self::Sleep),
            3 => Some(Self::Read),
            4 => Some(Self::Write),
            5 => Some(Self::GetProcessInfo),
            6 => Some(Self::GetSystemInfo),
            _ => None,
        }
    }
}

/// Reserved number that is never a valid syscall; exercises the
/// out-of-range path.
pub const SYS_BOGUS: u64 = N_SYSCALLS as u64 + 50;

const _: () = assert!(SyscallNumber::GetSystemInfo as usize == N_SYSCALLS - 1);

/// Per-process info codes for `get_process_info`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ProcessInfo {
    Pid = 0,
    Ppid = 1,
    State = 2,
    Wakeup = 3,
    Priority = 4,
    Quantum = 5,
    DefaultQuantum = 6,
}

impl ProcessInfo {
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Pid),
            1 => Some(Self::Ppid),
            2 => Some(Self::State),
            3 => Some(Self::Wakeup),
            4 => Some(Self::Priority),
            5 => Some(Self::Quantum),
            6 => Some(Self::DefaultQuantum),
            _ => None,
        }
    }
}

/// System-wide info codes for `get_system_info`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SystemInfo {
    Time = 0,
    NumProcs = 1,
    MaxProcs = 2,
}

impl SystemInfo {
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Time),
            1 => Some(Self::NumProcs),
            2 => Some(Self::MaxProcs),
            _ => None,
        }
    }
}

/// System call result type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallResult {
    Ok(u64),
    Err,
}

impl SyscallResult {
    /// Value written into the caller's RAX; errors read as -1.
    pub fn as_return(self) -> i64 {
        match self {
            SyscallResult::Ok(value) => value as i64,
            SyscallResult::Err => -1,
        }
    }
}
