//! R_RSB (Reduced Serial Bus) host controller
//!
//! Every transaction is bounded by the trusted watchdog counter. A bus that
//! never completes, or completes with anything but the transfer-done status,
//! is reported as [`ScpError::Bus`].

use scp_common::ScpError;

use crate::config::CLK_KHZ;
use crate::mmio::{bit, RegisterBus};
use crate::watchdog::Watchdog;

const CTRL_REG: usize = 0x00;
const CCR_REG: usize = 0x04;
const STAT_REG: usize = 0x0c;
const ADDR_REG: usize = 0x10;
const DATA_REG: usize = 0x1c;
const PMCR_REG: usize = 0x28;
const CMD_REG: usize = 0x2c;
const SADDR_REG: usize = 0x30;

const CTRL_SOFT_RESET: u32 = bit(0);
const CTRL_START: u32 = bit(7);
const STAT_TRANS_OVER: u32 = bit(0);
const PMCR_START: u32 = bit(31);

const CMD_RD8: u32 = 0x8b;
const CMD_WR8: u32 = 0x4e;
const CMD_SRTA: u32 = 0xe8;

/// Rate used until the device is switched to RSB mode (I2C compatible).
const INIT_RATE_HZ: u32 = 400_000;
const RUN_RATE_HZ: u32 = 3_000_000;
const CLK_HZ: u32 = CLK_KHZ * 1000;

/// Longest a single transaction may take (1 ms).
const TIMEOUT_CYCLES: u32 = CLK_KHZ;

/// Runtime address field of the slave address register.
pub const fn rtaddr(addr: u8) -> u32 {
    (addr as u32) << 16
}

#[derive(Debug, Clone, Copy)]
pub struct Rsb<B> {
    bus: B,
    base: usize,
    delay: Watchdog<B>,
}

impl<B: RegisterBus + Copy> Rsb<B> {
    pub const fn new(bus: B, base: usize, delay: Watchdog<B>) -> Self {
        Rsb { bus, base, delay }
    }

    /// Soft reset the controller and drop to the I2C-compatible rate. The
    /// bus clock and pin functions must already be configured.
    pub fn init(&self) -> Result<(), ScpError> {
        self.bus.write32(self.base + CTRL_REG, CTRL_SOFT_RESET);
        self.wait_clear(CTRL_REG, CTRL_SOFT_RESET)?;
        self.set_rate(INIT_RATE_HZ);
        Ok(())
    }

    fn set_rate(&self, rate: u32) {
        let divider = CLK_HZ / 2 / rate - 1;
        self.bus.write32(self.base + CCR_REG, bit(8) | divider);
    }

    /// Switch a device from I2C to RSB mode by writing `data` to its
    /// register `reg`, then assign it the runtime address in `dev`.
    pub fn init_device(&self, dev: u32, reg: u8, data: u8) -> Result<(), ScpError> {
        self.bus.write32(
            self.base + PMCR_REG,
            PMCR_START | u32::from(data) << 16 | u32::from(reg) << 8,
        );
        self.wait_clear(PMCR_REG, PMCR_START)?;
        self.set_rate(RUN_RATE_HZ);
        self.command(dev, CMD_SRTA)
    }

    pub fn read(&self, dev: u8, reg: u8) -> Result<u8, ScpError> {
        self.bus.write32(self.base + ADDR_REG, reg.into());
        self.command(rtaddr(dev), CMD_RD8)?;
        Ok(self.bus.read32(self.base + DATA_REG) as u8)
    }

    pub fn write(&self, dev: u8, reg: u8, data: u8) -> Result<(), ScpError> {
        self.bus.write32(self.base + ADDR_REG, reg.into());
        self.bus.write32(self.base + DATA_REG, data.into());
        self.command(rtaddr(dev), CMD_WR8)
    }

    fn command(&self, dev: u32, cmd: u32) -> Result<(), ScpError> {
        self.bus.write32(self.base + CMD_REG, cmd);
        self.bus.write32(self.base + SADDR_REG, dev);
        self.bus.write32(self.base + CTRL_REG, CTRL_START);
        self.wait_clear(CTRL_REG, CTRL_START)?;

        let status = self.bus.read32(self.base + STAT_REG);
        if status != STAT_TRANS_OVER {
            log::error!("RSB: transaction {:#04x} failed, status {:#x}", cmd, status);
            return Err(ScpError::Bus);
        }
        Ok(())
    }

    fn wait_clear(&self, reg: usize, mask: u32) -> Result<(), ScpError> {
        let addr = self.base + reg;
        if self
            .delay
            .poll_timeout(TIMEOUT_CYCLES, || !self.bus.get32(addr, mask))
        {
            Ok(())
        } else {
            log::error!("RSB: timeout waiting on register {:#x}", reg);
            Err(ScpError::Bus)
        }
    }
}
