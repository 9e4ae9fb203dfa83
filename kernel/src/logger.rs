//! Kernel logger
//!
//! Records logged before the console UART is programmed are kept in a fixed
//! buffer and flushed once [`serial_ready`] is called; after that every
//! record goes straight to COM1 as `[LEVEL] target: message`.

use crate::serial_println;
use core::fmt::{self, Write};
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

const BUFFER_SIZE: usize = 8192;

/// Buffer for storing log messages before serial is initialized
struct LogBuffer {
    buffer: [u8; BUFFER_SIZE],
    position: usize,
}

impl LogBuffer {
    const fn new() -> Self {
        Self {
            buffer: [0; BUFFER_SIZE],
            position: 0,
        }
    }

    fn contents(&self) -> &str {
        core::str::from_utf8(&self.buffer[..self.position]).unwrap_or("<invalid UTF-8>")
    }
}

impl Write for LogBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        if bytes.len() > BUFFER_SIZE - self.position {
            // Full: newer messages are dropped.
            return Ok(());
        }
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LoggerState {
    Buffering,
    SerialReady,
}

pub struct KernelLogger {
    buffer: Mutex<LogBuffer>,
    state: Mutex<LoggerState>,
    level: Level,
}

impl KernelLogger {
    const fn new(level: Level) -> Self {
        KernelLogger {
            buffer: Mutex::new(LogBuffer::new()),
            state: Mutex::new(LoggerState::Buffering),
            level,
        }
    }

    /// Flush buffered records and switch to direct serial output.
    pub fn serial_ready(&self) {
        let mut state = self.state.lock();
        let buffer = self.buffer.lock();
        if buffer.position > 0 {
            serial_println!("=== Buffered Boot Messages ===");
            serial_println!("{}", buffer.contents());
            serial_println!("=== End Buffered Messages ===");
        }
        *state = LoggerState::SerialReady;
    }
}

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // try_lock: a trap handler may log while boot code holds the lock.
        let state = match self.state.try_lock() {
            Some(state) => *state,
            None => {
                serial_println!("[INTR] {}: {}", record.target(), record.args());
                return;
            }
        };
        match state {
            LoggerState::Buffering => match self.buffer.try_lock() {
                Some(mut buffer) => {
                    let _ = writeln!(
                        &mut *buffer,
                        "[{:>5}] {}: {}",
                        record.level(),
                        record.target(),
                        record.args()
                    );
                }
                None => serial_println!("[BUFF] {}: {}", record.target(), record.args()),
            },
            LoggerState::SerialReady => {
                serial_println!(
                    "[{:>5}] {}: {}",
                    record.level(),
                    record.target(),
                    record.args()
                );
            }
        }
    }

    fn flush(&self) {}
}

pub static KERNEL_LOGGER: KernelLogger = KernelLogger::new(Level::Info);

/// Install the logger; can be called before serial is ready.
pub fn init_early() {
    if log::set_logger(&KERNEL_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// Call after the serial ports are initialized
pub fn serial_ready() {
    KERNEL_LOGGER.serial_ready();
}
