//! Saved register image of a process.
//!
//! The interrupt stubs push this record on entry and pop it on the way out,
//! so the field order is fixed: general registers first, then the trap
//! vector and error code, then the hardware `iretq` frame.

/// Code segment selector of the flat kernel GDT; processes run in ring 0.
pub const KERNEL_CODE_SELECTOR: u64 = 0x08;
/// Data/stack segment selector of the flat kernel GDT.
pub const KERNEL_DATA_SELECTOR: u64 = 0x10;

/// RFLAGS bit 1 is reserved and always reads as 1.
pub const RFLAGS_MUST_BE_1: u64 = 1 << 1;
/// Interrupt enable flag.
pub const RFLAGS_IF: u64 = 1 << 9;

/// Flags every new process starts with: interrupts enabled.
pub const DEFAULT_RFLAGS: u64 = RFLAGS_MUST_BE_1 | RFLAGS_IF;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub rdi: u64,
    pub rsi: u64,
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rbp: u64,

    pub vector: u64,
    pub code: u64,

    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

/// Size of [`Context`] in 64-bit words.
pub const CONTEXT_QUADS: usize = core::mem::size_of::<Context>() / 8;

impl Context {
    pub const ZERO: Context = Context {
        rdi: 0,
        rsi: 0,
        rax: 0,
        rbx: 0,
        rcx: 0,
        rdx: 0,
        r8: 0,
        r9: 0,
        r10: 0,
        r11: 0,
        r12: 0,
        r13: 0,
        r14: 0,
        r15: 0,
        rbp: 0,
        vector: 0,
        code: 0,
        rip: 0,
        cs: 0,
        rflags: 0,
        rsp: 0,
        ss: 0,
    };

    /// Initial image for a process that starts executing at `entry` with
    /// its stack pointer at `rsp`.
    pub const fn new(entry: u64, rsp: u64) -> Self {
        Context {
            rip: entry,
            cs: KERNEL_CODE_SELECTOR,
            rflags: DEFAULT_RFLAGS,
            rsp,
            ss: KERNEL_DATA_SELECTOR,
            ..Context::ZERO
        }
    }

    /// Syscall number (in RAX)
    pub fn syscall_number(&self) -> u64 {
        self.rax
    }

    /// Syscall arguments (RDI, RSI, RDX)
    pub fn args(&self) -> (u64, u64, u64) {
        (self.rdi, self.rsi, self.rdx)
    }

    /// Write the syscall return value (in RAX)
    pub fn set_return(&mut self, value: i64) {
        self.rax = value as u64;
    }

    /// Return value as the process will see it.
    pub fn return_value(&self) -> i64 {
        self.rax as i64
    }
}

/// Log a register image at debug level.
pub fn context_dump(label: &str, ctx: &Context) {
    log::debug!(
        "{}: vector {:#x} code {:#x} rip {:#x} cs {:#x} rflags {:#x} rsp {:#x}",
        label,
        ctx.vector,
        ctx.code,
        ctx.rip,
        ctx.cs,
        ctx.rflags,
        ctx.rsp
    );
    log::debug!(
        "  rax {:#x} rbx {:#x} rcx {:#x} rdx {:#x} rdi {:#x} rsi {:#x} rbp {:#x}",
        ctx.rax,
        ctx.rbx,
        ctx.rcx,
        ctx.rdx,
        ctx.rdi,
        ctx.rsi,
        ctx.rbp
    );
    log::debug!(
        "  r8 {:#x} r9 {:#x} r10 {:#x} r11 {:#x} r12 {:#x} r13 {:#x} r14 {:#x} r15 {:#x}",
        ctx.r8,
        ctx.r9,
        ctx.r10,
        ctx.r11,
        ctx.r12,
        ctx.r13,
        ctx.r14,
        ctx.r15
    );
}
