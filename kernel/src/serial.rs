//! Debug console
//!
//! The R_UART is a 16550-compatible port with its registers on a 32-bit
//! stride. Log records go out on it with an `SCP:` prefix. The console is
//! taken with `try_lock`, so a record emitted from an interrupt while the
//! main loop holds the port is dropped rather than deadlocking.

use core::fmt::{self, Write};

use lazy_static::lazy_static;
use spin::Mutex;

use crate::mmio::{bit, Mmio, RegisterBus};
use crate::platform::sun50i_a64::R_UART_BASE;

/// Receive buffer, transmit holding, or divisor latch low (with DLAB)
const THR_REG: usize = 0x00;
/// Interrupt enable, or divisor latch high (with DLAB)
const IER_REG: usize = 0x04;
const FCR_REG: usize = 0x08;
const LCR_REG: usize = 0x0c;
const LSR_REG: usize = 0x14;

const LCR_8N1: u32 = 0x03;
const LCR_DLAB: u32 = bit(7);
/// Enable and reset both FIFOs
const FCR_RESET: u32 = 0x07;
const LSR_THRE: u32 = bit(5);

/// 115200 baud from the 24 MHz APB clock
const BAUD_DIVISOR: u32 = 13;

pub struct Uart<B> {
    bus: B,
    base: usize,
}

impl<B: RegisterBus> Uart<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Uart { bus, base }
    }

    /// 115200 8N1, FIFOs on, no interrupts.
    pub fn init(&self) {
        self.bus.write32(self.base + IER_REG, 0);
        self.bus.write32(self.base + LCR_REG, LCR_DLAB | LCR_8N1);
        self.bus.write32(self.base + THR_REG, BAUD_DIVISOR & 0xff);
        self.bus.write32(self.base + IER_REG, BAUD_DIVISOR >> 8);
        self.bus.write32(self.base + LCR_REG, LCR_8N1);
        self.bus.write32(self.base + FCR_REG, FCR_RESET);
    }

    pub fn send(&self, byte: u8) {
        self.bus.poll32(self.base + LSR_REG, LSR_THRE);
        self.bus.write32(self.base + THR_REG, u32::from(byte));
    }
}

impl<B: RegisterBus> Write for Uart<B> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.send(b'\r');
            }
            self.send(byte);
        }
        Ok(())
    }
}

lazy_static! {
    pub static ref SERIAL1: Mutex<Uart<Mmio>> = {
        let uart = Uart::new(Mmio, R_UART_BASE);
        uart.init();
        Mutex::new(uart)
    };
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    if let Some(mut serial) = SERIAL1.try_lock() {
        let _ = serial.write_fmt(args);
    }
}

/// Prints to the debug console.
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*))
    };
}

/// Prints to the debug console, appending a newline.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($fmt:expr) => ($crate::serial_print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::serial_print!(
        concat!($fmt, "\n"), $($arg)*));
}

struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            serial_println!("SCP: {}: {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

/// Route `log` records to the debug console. Without the `debug-log`
/// feature nothing is installed and records are discarded.
pub fn init_logger() {
    if !cfg!(feature = "debug-log") {
        return;
    }
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Debug);
    }
}
