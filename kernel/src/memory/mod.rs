//! Memory owned by the kernel: the process stack pool and, on bare metal,
//! the small boot heap backing device input buffers.

#[cfg(all(target_os = "none", not(test)))]
pub mod heap;
pub mod stack;

pub use stack::{Stack, StackIndex, StackPool};
