//! Character I/O collaborators reachable from the read and write syscalls.

/// File descriptor of the console.
pub const FD_CONSOLE: u64 = 0;
/// File descriptor of the second serial line.
pub const FD_SIO: u64 = 1;

/// A byte-oriented device.
pub trait CharDevice {
    /// Bytes that can be read right now without waiting.
    fn pending(&self) -> usize;

    /// Next buffered input byte, if any.
    fn read_byte(&mut self) -> Option<u8>;

    /// Emit `bytes` in order.
    fn write_bytes(&mut self, bytes: &[u8]);
}

/// The devices a syscall may address, by file descriptor.
pub struct Devices<'a> {
    pub console: &'a mut dyn CharDevice,
    pub sio: &'a mut dyn CharDevice,
}

impl<'a> Devices<'a> {
    pub fn new(console: &'a mut dyn CharDevice, sio: &'a mut dyn CharDevice) -> Self {
        Self { console, sio }
    }

    pub fn by_fd(&mut self, fd: u64) -> Option<&mut (dyn CharDevice + 'a)> {
        match fd {
            FD_CONSOLE => Some(&mut *self.console),
            FD_SIO => Some(&mut *self.sio),
            _ => None,
        }
    }
}
