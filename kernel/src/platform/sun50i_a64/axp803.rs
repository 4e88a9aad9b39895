//! X-Powers AXP803 PMIC, reached over RSB

use scp_common::ScpError;

use crate::mmio::{bit, genmask, RegisterBus};
use crate::platform::IrqOutcome;
use crate::system::SystemState;
use crate::watchdog::Watchdog;

use super::rsb::{rtaddr, Rsb};

const RSB_HWADDR: u32 = 0x03a3;
const RSB_RTADDR: u8 = 0x2d;
const MODE_REG: u8 = 0x3e;
const MODE_RSB: u8 = 0x7c;

const ON_OFF_CTRL_REG1: u8 = 0x10;
const WAKEUP_CTRL_REG: u8 = 0x31;
const POWER_DISABLE_REG: u8 = 0x32;
const POWER_KEY_CTRL_REG: u8 = 0x36;
const IRQ_EN_REG1: u8 = 0x40;
const IRQ_EN_REG5: u8 = 0x44;
const IRQ_STAT_REG4: u8 = 0x4b;
const IRQ_STAT_REG5: u8 = 0x4c;
const FUNCTION_CTRL_REG: u8 = 0x8f;

const IRQ_EN_COUNT: usize = 6;

const WAKEUP_SOFT_RESTART: u8 = bit(6) as u8;
const WAKEUP_SOFT_WAKEUP: u8 = bit(5) as u8;
/// Allow IRQs while suspended, then enter suspend
const WAKEUP_SUSPEND: u8 = (bit(4) | bit(3)) as u8;
const POWER_DISABLE_OFF: u8 = bit(7) as u8;
/// Power key short press (in IRQ_EN_REG5 / IRQ_STAT_REG5)
const IRQ_POWER_KEY: u8 = bit(5) as u8;
/// Die over temperature (in IRQ_STAT_REG4)
const IRQ_OVERHEAT: u8 = bit(7) as u8;
/// Wake up automatically on any enabled IRQ
const FUNCTION_IRQ_WAKEUP: u8 = bit(7) as u8;
/// Shutdown on overheat or 16 s key press, keep voltages across suspend
const FUNCTION_DEFAULTS: u8 = genmask(3, 1) as u8;
/// DCDC1..3: CPU and main peripheral rails
const RAILS_CPU: u8 = genmask(2, 0) as u8;

/// Time for the rails to come back after a soft wakeup (250 ms).
const RESUME_SETTLE_US: u32 = 250_000;

pub struct Axp803<B> {
    rsb: Rsb<B>,
    delay: Watchdog<B>,
    saved_irq_enable: [u8; IRQ_EN_COUNT],
}

impl<B: RegisterBus + Copy> Axp803<B> {
    pub const fn new(rsb: Rsb<B>, delay: Watchdog<B>) -> Self {
        Axp803 {
            rsb,
            delay,
            saved_irq_enable: [0; IRQ_EN_COUNT],
        }
    }

    pub fn init(&mut self) -> Result<(), ScpError> {
        self.rsb.init()?;
        self.rsb
            .init_device(rtaddr(RSB_RTADDR) | RSB_HWADDR, MODE_REG, MODE_RSB)?;

        // Power-off IRQ after a 4 s key press.
        self.clr(POWER_KEY_CTRL_REG, genmask(1, 0) as u8)?;
        self.set(FUNCTION_CTRL_REG, FUNCTION_DEFAULTS)
    }

    /// Keep only the power key as a wakeup source and cut the CPU rails.
    pub fn suspend(&mut self) -> Result<(), ScpError> {
        for (i, saved) in self.saved_irq_enable.iter_mut().enumerate() {
            let reg = IRQ_EN_REG1 + i as u8;
            *saved = self.rsb.read(RSB_RTADDR, reg)?;
            let keep = if reg == IRQ_EN_REG5 { IRQ_POWER_KEY } else { 0 };
            self.rsb.write(RSB_RTADDR, reg, keep)?;
        }

        self.clr(FUNCTION_CTRL_REG, FUNCTION_IRQ_WAKEUP)?;
        self.set(WAKEUP_CTRL_REG, WAKEUP_SUSPEND)?;
        self.clr(ON_OFF_CTRL_REG1, RAILS_CPU)
    }

    pub fn resume(&mut self) -> Result<(), ScpError> {
        self.set(WAKEUP_CTRL_REG, WAKEUP_SOFT_WAKEUP)?;
        self.delay.udelay(RESUME_SETTLE_US);

        for (i, &saved) in self.saved_irq_enable.iter().enumerate() {
            self.rsb.write(RSB_RTADDR, IRQ_EN_REG1 + i as u8, saved)?;
        }
        Ok(())
    }

    pub fn shutdown(&mut self) -> Result<(), ScpError> {
        self.set(POWER_DISABLE_REG, POWER_DISABLE_OFF)
    }

    pub fn reset(&mut self) -> Result<(), ScpError> {
        self.set(WAKEUP_CTRL_REG, WAKEUP_SOFT_RESTART)
    }

    /// While suspended, the PMIC line means either overheat or a power key
    /// press. At any other time it belongs to the rich OS.
    pub fn irq(&mut self, state: SystemState) -> Result<IrqOutcome, ScpError> {
        if state != SystemState::Suspend {
            return Ok(IrqOutcome::NotMine);
        }

        if self.rsb.read(RSB_RTADDR, IRQ_STAT_REG4)? & IRQ_OVERHEAT != 0 {
            return Ok(IrqOutcome::PowerOff);
        }

        if self.rsb.read(RSB_RTADDR, IRQ_STAT_REG5)? & IRQ_POWER_KEY != 0 {
            self.rsb.write(RSB_RTADDR, IRQ_STAT_REG5, IRQ_POWER_KEY)?;
            return Ok(IrqOutcome::Wakeup);
        }

        Ok(IrqOutcome::Handled)
    }

    fn set(&self, reg: u8, bits: u8) -> Result<(), ScpError> {
        let value = self.rsb.read(RSB_RTADDR, reg)?;
        self.rsb.write(RSB_RTADDR, reg, value | bits)
    }

    fn clr(&self, reg: u8, bits: u8) -> Result<(), ScpError> {
        let value = self.rsb.read(RSB_RTADDR, reg)?;
        self.rsb.write(RSB_RTADDR, reg, value & !bits)
    }
}
