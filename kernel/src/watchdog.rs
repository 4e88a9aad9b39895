//! Trusted watchdog (R_TWD) and the free-running counter
//!
//! The watchdog's counter runs at the 24 MHz reference clock and doubles as
//! the firmware's only time base: busy-wait delays and poll timeouts are
//! measured against it.

use crate::config::{CLK_MHZ, WATCHDOG_INTERVAL_CYCLES};
use crate::mmio::{bit, RegisterBus};

const RESTART_KEY: u32 = 0x0d14_0000;

const CTRL_REG: usize = 0x0010;
const RESTART_REG: usize = 0x0014;
const LOW_CNT_REG: usize = 0x0020;
const INTERVAL_REG: usize = 0x0030;

/// Handle to the R_TWD block. Cheap to copy.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog<B> {
    bus: B,
    base: usize,
}

impl<B: RegisterBus> Watchdog<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Watchdog { bus, base }
    }

    /// Stop the counter, arm system reset, program the default interval,
    /// pet the watchdog, and start counting.
    pub fn init(&self) {
        self.bus.set32(self.base + CTRL_REG, bit(1) | bit(9));
        self.set_interval(WATCHDOG_INTERVAL_CYCLES);
        self.restart();
        self.bus.clrset32(self.base + CTRL_REG, bit(1), bit(31));
    }

    pub fn read_counter(&self) -> u32 {
        self.bus.read32(self.base + LOW_CNT_REG)
    }

    /// Pet the watchdog.
    pub fn restart(&self) {
        self.bus.write32(self.base + RESTART_REG, RESTART_KEY | bit(0));
    }

    pub fn set_interval(&self, cycles: u32) {
        self.bus.write32(self.base + INTERVAL_REG, cycles);
    }

    /// Counter cycles elapsed since `start`, correct across one wrap.
    pub fn elapsed_since(&self, start: u32) -> u32 {
        self.read_counter().wrapping_sub(start)
    }

    /// Spin for at least `micros` microseconds.
    pub fn udelay(&self, micros: u32) {
        let start = self.read_counter();
        let cycles = CLK_MHZ.saturating_mul(micros);
        while self.elapsed_since(start) < cycles {
            core::hint::spin_loop();
        }
    }

    /// Poll `done` until it returns true or `timeout` cycles elapse.
    /// Returns the last value of `done`.
    pub fn poll_timeout(&self, timeout: u32, mut done: impl FnMut() -> bool) -> bool {
        let start = self.read_counter();
        loop {
            if done() {
                return true;
            }
            if self.elapsed_since(start) >= timeout {
                return false;
            }
        }
    }
}
