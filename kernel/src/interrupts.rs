//! Interrupt handling: the clock tick handler and, on x86_64, the legacy
//! PIC pair and PIT that deliver the hardware interrupts.

pub mod timer;

#[cfg(target_arch = "x86_64")]
pub use self::pic::*;

#[cfg(target_arch = "x86_64")]
mod pic {
    use crate::config::CLOCK_FREQUENCY;
    use pic8259::ChainedPics;
    use x86_64::instructions::port::Port;

    pub const PIC_1_OFFSET: u8 = 32;
    pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

    pub static PICS: spin::Mutex<ChainedPics> =
        spin::Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

    #[derive(Debug, Clone, Copy)]
    #[repr(u8)]
    pub enum InterruptIndex {
        Timer = PIC_1_OFFSET,
        Com2 = PIC_1_OFFSET + 3,
        Com1 = PIC_1_OFFSET + 4,
    }

    impl InterruptIndex {
        pub fn as_u8(self) -> u8 {
            self as u8
        }
    }

    const PIT_INPUT_FREQ_HZ: u64 = 1_193_182;
    const PIT_COMMAND_PORT: u16 = 0x43;
    const PIT_CHANNEL0_PORT: u16 = 0x40;

    /// Remap the PICs and unmask the timer and both serial lines.
    pub fn init_pic() {
        unsafe {
            let mut pics = PICS.lock();
            pics.initialize();
            // IRQ0 timer, IRQ3 COM2, IRQ4 COM1
            pics.write_masks(!0b0001_1001, 0xff);
        }
        log::info!("pic: remapped to {}/{}", PIC_1_OFFSET, PIC_2_OFFSET);
    }

    /// Program PIT channel 0 to fire `CLOCK_FREQUENCY` times a second.
    pub fn init_pit() {
        let divisor = (PIT_INPUT_FREQ_HZ / CLOCK_FREQUENCY) as u16;
        unsafe {
            let mut cmd: Port<u8> = Port::new(PIT_COMMAND_PORT);
            let mut ch0: Port<u8> = Port::new(PIT_CHANNEL0_PORT);

            // Counter 0, lobyte/hibyte, mode 3 (square wave), binary
            cmd.write(0x36);
            ch0.write((divisor & 0xFF) as u8);
            ch0.write((divisor >> 8) as u8);
        }
        log::info!("pit: {} Hz", CLOCK_FREQUENCY);
    }

    pub fn end_of_interrupt(index: InterruptIndex) {
        unsafe {
            PICS.lock().notify_end_of_interrupt(index.as_u8());
        }
    }
}
