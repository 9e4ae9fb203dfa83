//! Process stack pool
//!
//! A fixed array of stacks, each exactly `STACK_QUADS` words. Free stacks
//! sit on a FIFO free queue; a stack leaves the pool as a [`StackIndex`]
//! token that is not `Clone`, so exactly one PCB can hold it.
//!
//! Layout of a stack, low to high addresses:
//!
//! ```text
//! +----------------------+
//! | runtime area         |  <- process call frames grow down into this
//! +----------------------+
//! | Context              |  <- register image restored on dispatch
//! +----------------------+
//! | return address       |  <- exit trampoline; rsp starts here
//! +----------------------+
//! | 0                    |
//! +----------------------+
//! ```

use crate::config::{N_STACKS, STACK_QUADS};
use crate::process::context::{Context, CONTEXT_QUADS};
use crate::queue::{QueueId, QueueOrder};
use crate::system::Queues;

const BODY_QUADS: usize = STACK_QUADS - CONTEXT_QUADS - 2;

#[repr(C)]
pub struct Stack {
    pub body: [u64; BODY_QUADS],
    pub context: Context,
    pub return_address: u64,
    pub sentinel: u64,
}

const _: () = assert!(core::mem::size_of::<Stack>() == STACK_QUADS * 8);

impl Stack {
    pub const EMPTY: Stack = Stack {
        body: [0; BODY_QUADS],
        context: Context::ZERO,
        return_address: 0,
        sentinel: 0,
    };

    fn clear(&mut self) {
        self.body.fill(0);
        self.context = Context::ZERO;
        self.return_address = 0;
        self.sentinel = 0;
    }

    /// Address the initial `rsp` of a new process points at.
    pub fn return_address_slot(&self) -> u64 {
        &self.return_address as *const u64 as u64
    }
}

/// Ownership token for one stack of the pool.
#[derive(Debug, PartialEq, Eq)]
pub struct StackIndex(usize);

impl StackIndex {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

pub struct StackPool {
    stacks: [Stack; N_STACKS],
    free: Option<QueueId>,
}

impl StackPool {
    pub const fn new() -> Self {
        Self {
            stacks: [Stack::EMPTY; N_STACKS],
            free: None,
        }
    }

    /// Carve the pool: every stack is cleared and put on the free queue.
    pub fn init(&mut self, queues: &mut Queues) {
        let free = match queues.alloc_one(QueueOrder::Fifo) {
            Some(q) => q,
            None => panic!("stack: no queue object for the free stack list"),
        };
        self.free = Some(free);
        for i in 0..N_STACKS {
            self.stacks[i].clear();
            queues.insert(free, i, 0);
        }
        log::info!(
            "stack: {} stacks of {} bytes",
            N_STACKS,
            core::mem::size_of::<Stack>()
        );
    }

    pub fn alloc(&mut self, queues: &mut Queues) -> Option<StackIndex> {
        let free = self.free_queue();
        queues.remove(free).map(StackIndex)
    }

    /// Clear the stack and return it to the pool. Consumes the token.
    pub fn dealloc(&mut self, queues: &mut Queues, stack: StackIndex) {
        let free = self.free_queue();
        self.stacks[stack.0].clear();
        queues.insert(free, stack.0, 0);
    }

    pub fn get(&self, stack: &StackIndex) -> &Stack {
        &self.stacks[stack.0]
    }

    pub fn get_mut(&mut self, stack: &StackIndex) -> &mut Stack {
        &mut self.stacks[stack.0]
    }

    pub fn free_count(&self, queues: &Queues) -> usize {
        self.free.map_or(0, |q| queues.len(q))
    }

    fn free_queue(&self) -> QueueId {
        match self.free {
            Some(q) => q,
            None => panic!("stack: pool used before init"),
        }
    }
}

impl Default for StackPool {
    fn default() -> Self {
        Self::new()
    }
}
