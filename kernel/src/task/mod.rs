//! Scheduling of processes onto the single CPU.

pub mod scheduler;

pub use scheduler::{NextAction, Scheduler};
