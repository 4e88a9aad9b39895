//! R_INTC interrupt controller driver

use crate::mmio::{bit, RegisterBus};

const VECTOR_REG: usize = 0x0000;
const BASE_ADDR_REG: usize = 0x0004;
/// Pending status, write-one-to-clear
const IRQ_PEND_REG: usize = 0x0010;
const IRQ_EN_REG: usize = 0x0040;
const IRQ_MASK_REG: usize = 0x0050;

/// Number of lines handled by the controller
pub const IRQ_COUNT: u8 = 32;

#[derive(Debug, Clone, Copy)]
pub struct Intc<B> {
    bus: B,
    base: usize,
}

impl<B: RegisterBus> Intc<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Intc { bus, base }
    }

    /// Reset the controller: everything disabled, unmasked and cleared.
    pub fn init(&self) {
        self.bus.write32(self.base + BASE_ADDR_REG, 0);
        self.bus.write32(self.base + IRQ_EN_REG, 0);
        self.bus.write32(self.base + IRQ_MASK_REG, 0);
        self.bus.write32(self.base + IRQ_PEND_REG, u32::MAX);
    }

    /// Line number of the highest-priority pending interrupt.
    pub fn current_irq(&self) -> u8 {
        (self.bus.read32(self.base + VECTOR_REG) >> 2) as u8
    }

    pub fn is_pending(&self, irq: u8) -> bool {
        irq < IRQ_COUNT && self.bus.get32(self.base + IRQ_PEND_REG, bit(irq.into()))
    }

    pub fn clear_pending(&self, irq: u8) {
        if irq < IRQ_COUNT {
            self.bus.write32(self.base + IRQ_PEND_REG, bit(irq.into()));
        }
    }

    pub fn enable(&self, irq: u8) {
        if irq < IRQ_COUNT {
            self.bus.set32(self.base + IRQ_EN_REG, bit(irq.into()));
        }
    }

    pub fn disable(&self, irq: u8) {
        if irq < IRQ_COUNT {
            self.bus.clr32(self.base + IRQ_EN_REG, bit(irq.into()));
        }
    }

    pub fn mask(&self, irq: u8) {
        if irq < IRQ_COUNT {
            self.bus.set32(self.base + IRQ_MASK_REG, bit(irq.into()));
        }
    }

    pub fn unmask(&self, irq: u8) {
        if irq < IRQ_COUNT {
            self.bus.clr32(self.base + IRQ_MASK_REG, bit(irq.into()));
        }
    }

    pub fn is_masked(&self, irq: u8) -> bool {
        irq < IRQ_COUNT && self.bus.get32(self.base + IRQ_MASK_REG, bit(irq.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SIM_DEVICES};

    #[test]
    fn test_init_clears_everything() {
        let bus = SimBus::new();
        let intc = Intc::new(&bus, SIM_DEVICES.r_intc);
        intc.enable(3);
        intc.mask(3);
        bus.raise_irq(3);

        intc.init();

        assert_eq!(bus.peek(SIM_DEVICES.r_intc + IRQ_EN_REG), 0);
        assert!(!intc.is_masked(3));
        assert!(!intc.is_pending(3));
    }

    #[test]
    fn test_vector_reports_lowest_pending_line() {
        let bus = SimBus::new();
        let intc = Intc::new(&bus, SIM_DEVICES.r_intc);
        bus.raise_irq(17);
        bus.raise_irq(5);
        assert_eq!(intc.current_irq(), 5);
        intc.clear_pending(5);
        assert_eq!(intc.current_irq(), 17);
        assert!(intc.is_pending(17));
    }

    #[test]
    fn test_mask_and_enable_bits() {
        let bus = SimBus::new();
        let intc = Intc::new(&bus, SIM_DEVICES.r_intc);
        intc.enable(17);
        intc.mask(9);
        assert_eq!(bus.peek(SIM_DEVICES.r_intc + IRQ_EN_REG), 1 << 17);
        assert!(intc.is_masked(9));
        intc.unmask(9);
        intc.disable(17);
        assert!(!intc.is_masked(9));
        assert_eq!(bus.peek(SIM_DEVICES.r_intc + IRQ_EN_REG), 0);
    }

    #[test]
    fn test_out_of_range_line_ignored() {
        let bus = SimBus::new();
        let intc = Intc::new(&bus, SIM_DEVICES.r_intc);
        intc.mask(40);
        assert_eq!(bus.peek(SIM_DEVICES.r_intc + IRQ_MASK_REG), 0);
        assert!(!intc.is_pending(40));
    }
}
