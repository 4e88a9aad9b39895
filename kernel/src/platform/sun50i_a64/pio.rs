//! R_PIO port L as a wakeup source
//!
//! PL12 is wired to the power button (or lid switch) on the boards this
//! firmware targets. While suspended it is configured as a rising-edge
//! external interrupt; the runtime pin configuration is restored on resume.

use crate::mmio::{bit, genmask, RegisterBus};
use crate::platform::IrqOutcome;
use crate::system::SystemState;

const PL_CFG_REG0: usize = 0x0000;
const PL_CFG_REG1: usize = 0x0004;
const PL_PULL_REG0: usize = 0x001c;
const PL_INT_CFG_REG1: usize = 0x0204;
const PL_INT_CTRL_REG: usize = 0x0210;
const PL_INT_STAT_REG: usize = 0x0214;

/// Registers touched by [`RPio::enable_wakeup`], in save order
const WAKEUP_REGS: [usize; 4] = [PL_CFG_REG1, PL_PULL_REG0, PL_INT_CFG_REG1, PL_INT_CTRL_REG];

const PL12_FUNC_MASK: u32 = genmask(18, 16);
/// Function 0b110: external interrupt
const PL12_FUNC_EINT: u32 = genmask(18, 17);
const PL12_PULL_MASK: u32 = genmask(25, 24);
/// Trigger mode field, 0 = rising edge
const PL12_INT_MODE_MASK: u32 = genmask(19, 16);
const PL12_INT: u32 = bit(12);

pub struct RPio<B> {
    bus: B,
    base: usize,
    saved: [u32; WAKEUP_REGS.len()],
}

impl<B: RegisterBus> RPio<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        RPio {
            bus,
            base,
            saved: [0; WAKEUP_REGS.len()],
        }
    }

    /// Disable and clear every port L interrupt. The bus clock must already
    /// be running.
    pub fn init(&self) {
        self.bus.write32(self.base + PL_INT_CTRL_REG, 0);
        self.bus.write32(self.base + PL_INT_STAT_REG, u32::MAX);
    }

    /// Select a function for one of the low pins of port L.
    pub fn set_pin_function(&self, pin: u8, function: u8) {
        let reg = PL_CFG_REG0 + usize::from(pin / 8) * 4;
        let shift = u32::from(pin % 8) * 4;
        self.bus
            .clrset32(self.base + reg, 0x7 << shift, u32::from(function) << shift);
    }

    pub fn enable_wakeup(&mut self) {
        for (saved, reg) in self.saved.iter_mut().zip(WAKEUP_REGS) {
            *saved = self.bus.read32(self.base + reg);
        }

        self.bus
            .clrset32(self.base + PL_CFG_REG1, PL12_FUNC_MASK, PL12_FUNC_EINT);
        self.bus.clr32(self.base + PL_PULL_REG0, PL12_PULL_MASK);
        self.bus.clr32(self.base + PL_INT_CFG_REG1, PL12_INT_MODE_MASK);
        self.bus.set32(self.base + PL_INT_CTRL_REG, PL12_INT);
    }

    pub fn disable_wakeup(&mut self) {
        for (&saved, reg) in self.saved.iter().zip(WAKEUP_REGS) {
            self.bus.write32(self.base + reg, saved);
        }
    }

    /// Any port L edge outside runtime is a wakeup request.
    pub fn irq(&mut self, state: SystemState) -> IrqOutcome {
        let status = self.bus.read32(self.base + PL_INT_STAT_REG);
        if status == 0 || state == SystemState::Runtime {
            return IrqOutcome::NotMine;
        }

        self.bus.write32(self.base + PL_INT_STAT_REG, status);
        IrqOutcome::Wakeup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBus;

    const BASE: usize = 0x01f0_2c00;

    #[test]
    fn test_wakeup_config_saved_and_restored() {
        let bus = SimBus::new();
        bus.poke(BASE + PL_CFG_REG1, 0x7777_7777);
        bus.poke(BASE + PL_PULL_REG0, 0x0100_0000);
        bus.poke(BASE + PL_INT_CFG_REG1, 0x0001_0000);
        let mut pio = RPio::new(&bus, BASE);

        pio.enable_wakeup();

        assert_eq!(bus.peek(BASE + PL_CFG_REG1), 0x7776_7777);
        assert_eq!(bus.peek(BASE + PL_PULL_REG0), 0);
        assert_eq!(bus.peek(BASE + PL_INT_CFG_REG1), 0);
        assert_eq!(bus.peek(BASE + PL_INT_CTRL_REG), PL12_INT);

        pio.disable_wakeup();

        assert_eq!(bus.peek(BASE + PL_CFG_REG1), 0x7777_7777);
        assert_eq!(bus.peek(BASE + PL_PULL_REG0), 0x0100_0000);
        assert_eq!(bus.peek(BASE + PL_INT_CFG_REG1), 0x0001_0000);
        assert_eq!(bus.peek(BASE + PL_INT_CTRL_REG), 0);
    }

    #[test]
    fn test_pin_function() {
        let bus = SimBus::new();
        let pio = RPio::new(&bus, BASE);
        pio.set_pin_function(0, 2);
        pio.set_pin_function(1, 2);
        assert_eq!(bus.peek(BASE + PL_CFG_REG0), 0x22);
    }

    #[test]
    fn test_irq_wakes_only_outside_runtime() {
        let bus = SimBus::new();
        let mut pio = RPio::new(&bus, BASE);
        bus.poke(BASE + PL_INT_STAT_REG, PL12_INT);

        assert_eq!(pio.irq(SystemState::Runtime), IrqOutcome::NotMine);
        assert_eq!(pio.irq(SystemState::Suspend), IrqOutcome::Wakeup);
        assert_eq!(bus.writes_to(BASE + PL_INT_STAT_REG), vec![PL12_INT]);
    }
}
