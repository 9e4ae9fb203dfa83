//! Serial ports
//!
//! COM1 is the console (and the log sink), COM2 the second serial line.
//! Output goes straight to the UART; input bytes are pushed by the serial
//! interrupt into a bounded queue per port and drained by the read syscall.

use conquer_once::spin::OnceCell;
use core::fmt;
use crossbeam_queue::ArrayQueue;
use spin::Mutex;
use uart_16550::SerialPort;
use x86_64::instructions::port::Port;

use crate::devices::CharDevice;

const COM1_PORT: u16 = 0x3F8;
const COM2_PORT: u16 = 0x2F8;

/// Line status register offset and its "data ready" bit.
const LINE_STATUS: u16 = 5;
const LSR_DATA_READY: u8 = 0x01;

const INPUT_QUEUE_SIZE: usize = 256;

pub static SERIAL1: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(COM1_PORT) });
pub static SERIAL2: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(COM2_PORT) });

static COM1_INPUT: OnceCell<ArrayQueue<u8>> = OnceCell::uninit();
static COM2_INPUT: OnceCell<ArrayQueue<u8>> = OnceCell::uninit();

/// Which UART an interrupt or device refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Com {
    Com1,
    Com2,
}

impl Com {
    fn base(self) -> u16 {
        match self {
            Com::Com1 => COM1_PORT,
            Com::Com2 => COM2_PORT,
        }
    }

    fn port(self) -> &'static Mutex<SerialPort> {
        match self {
            Com::Com1 => &SERIAL1,
            Com::Com2 => &SERIAL2,
        }
    }

    fn input(self) -> &'static OnceCell<ArrayQueue<u8>> {
        match self {
            Com::Com1 => &COM1_INPUT,
            Com::Com2 => &COM2_INPUT,
        }
    }
}

/// Program both UARTs. `init` also enables their receive interrupts.
pub fn init() {
    SERIAL1.lock().init();
    SERIAL2.lock().init();
}

/// Create the input queues; needs the heap.
pub fn init_input() {
    for com in [Com::Com1, Com::Com2] {
        if com
            .input()
            .try_init_once(|| ArrayQueue::new(INPUT_QUEUE_SIZE))
            .is_err()
        {
            log::warn!("serial: {:?} input queue already initialized", com);
        }
    }
    log::info!("serial: input queues ready");
}

/// Called by the serial interrupt: move every received byte into the
/// port's input queue. Must not block or allocate.
pub fn drain_receiver(com: Com) {
    let mut lsr: Port<u8> = Port::new(com.base() + LINE_STATUS);
    let mut data: Port<u8> = Port::new(com.base());
    // SAFETY: reading the UART status and data registers has no side
    // effects beyond consuming the received byte.
    while unsafe { lsr.read() } & LSR_DATA_READY != 0 {
        let byte = unsafe { data.read() };
        add_serial_byte(com, byte);
    }
}

pub fn add_serial_byte(com: Com, byte: u8) {
    match com.input().try_get() {
        Ok(queue) => {
            if queue.push(byte).is_err() {
                log::warn!("serial: {:?} input queue full; dropping input", com);
            }
        }
        Err(_) => log::warn!("serial: {:?} input queue uninitialized", com),
    }
}

/// Bytes received on `com` and not yet read.
pub fn input_pending(com: Com) -> usize {
    com.input().try_get().map_or(0, |q| q.len())
}

/// Log how much input is buffered on each port.
pub fn dump_input() {
    for com in [Com::Com1, Com::Com2] {
        log::info!("serial: {:?} input {} bytes", com, input_pending(com));
    }
}

/// A serial line seen through the [`CharDevice`] interface.
pub struct SerialDevice {
    com: Com,
}

impl SerialDevice {
    pub const fn new(com: Com) -> Self {
        Self { com }
    }
}

impl CharDevice for SerialDevice {
    fn pending(&self) -> usize {
        input_pending(self.com)
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.com.input().try_get().ok()?.pop()
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut port = self.com.port().lock();
        for &b in bytes {
            port.send(b);
        }
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    // Handlers run with interrupts off; only a logger on the boot path can
    // race here, and a lost line is better than a deadlock.
    if let Some(mut port) = SERIAL1.try_lock() {
        let _ = port.write_fmt(args);
    }
}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => ($crate::serial::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($fmt:expr) => ($crate::serial_print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::serial_print!(
        concat!($fmt, "\n"), $($arg)*));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_received_bytes_are_pending_until_read() {
        init_input();
        let mut dev = SerialDevice::new(Com::Com2);
        let before = input_pending(Com::Com2);
        add_serial_byte(Com::Com2, b'a');
        add_serial_byte(Com::Com2, b'b');
        assert_eq!(dev.pending(), before + 2);
        dump_input();

        while dev.pending() > 2 {
            dev.read_byte();
        }
        assert_eq!(dev.read_byte(), Some(b'a'));
        assert_eq!(dev.read_byte(), Some(b'b'));
        assert_eq!(input_pending(Com::Com2), 0);
    }
}
