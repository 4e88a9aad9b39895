//! Allwinner A64 (sun50i)
//!
//! The SCP is the AR100 core in the always-on power domain. Device addresses
//! below are as seen from the AR100, which maps SRAM A2 at address zero.

mod axp803;
mod css;
mod pio;
mod rsb;

pub use self::axp803::Axp803;
pub use self::css::{select_aarch64, A64Hooks};
pub use self::pio::RPio;
pub use self::rsb::Rsb;

use scp_common::ScpError;

use crate::css::Coordinator;
#[cfg(not(test))]
use crate::interrupts::{InterruptControl, IrqFlags};
use crate::mmio::{bit, Mmio, RegisterBus};
use crate::system::SystemState;
use crate::watchdog::Watchdog;

use super::{Board, Clock, DeviceMap, IrqOutcome};
#[cfg(not(test))]
use super::Platform;

pub const CPUCFG_BASE: usize = 0x0170_0000;
pub const MSGBOX_BASE: usize = 0x01c1_7000;
pub const CCU_BASE: usize = 0x01c2_0000;
pub const R_INTC_BASE: usize = 0x01f0_0c00;
pub const R_PRCM_BASE: usize = 0x01f0_1400;
pub const R_TWD_BASE: usize = 0x01f0_1800;
pub const R_CPUCFG_BASE: usize = 0x01f0_1c00;
pub const R_UART_BASE: usize = 0x01f0_2800;
pub const R_PIO_BASE: usize = 0x01f0_2c00;
pub const R_RSB_BASE: usize = 0x01f0_3400;
/// Last 1 KiB of SRAM A2
pub const SCPI_MEM_BASE: usize = 0x0001_3c00;

pub const DEVICES: DeviceMap = DeviceMap {
    msgbox: MSGBOX_BASE,
    r_intc: R_INTC_BASE,
    r_twd: R_TWD_BASE,
    scpi_mem: SCPI_MEM_BASE,
};

/// A bus clock: gate bit and, where present, reset bit, each a
/// (register offset, bit) pair.
struct ClockGate {
    gate: (usize, u32),
    reset: Option<(usize, u32)>,
}

const CCU_MSGBOX: ClockGate = ClockGate {
    gate: (0x0064, 21),
    reset: Some((0x02c4, 21)),
};

const R_PRCM_R_PIO: ClockGate = ClockGate {
    gate: (0x0028, 0),
    reset: None,
};

const R_PRCM_R_RSB: ClockGate = ClockGate {
    gate: (0x0028, 3),
    reset: Some((0x00b0, 3)),
};

/// RSB data and clock are functions 2 of PL0 and PL1.
const RSB_PIN_FUNCTION: u8 = 2;

pub struct A64Platform<B = Mmio> {
    bus: B,
    delay: Watchdog<B>,
    pio: RPio<B>,
    pmic: Axp803<B>,
}

impl<B: RegisterBus + Copy> A64Platform<B> {
    pub fn new(bus: B) -> Self {
        let delay = Watchdog::new(bus, R_TWD_BASE);
        A64Platform {
            bus,
            delay,
            pio: RPio::new(bus, R_PIO_BASE),
            pmic: Axp803::new(Rsb::new(bus, R_RSB_BASE, delay), delay),
        }
    }

    /// Power coordination for the single A53 cluster, probed from the
    /// current reset and clamp state. Only reads registers.
    pub fn css(&self) -> Coordinator<A64Hooks<B>> {
        Coordinator::new(A64Hooks::new(self.bus, self.delay))
    }

    fn enable_gate(&self, base: usize, clock: &ClockGate) {
        let (reg, n) = clock.gate;
        self.bus.set32(base + reg, bit(n));
        if let Some((reg, n)) = clock.reset {
            self.bus.set32(base + reg, bit(n));
        }
    }
}

impl<B: RegisterBus + Copy> Board for A64Platform<B> {
    fn init(&mut self) -> Result<(), ScpError> {
        select_aarch64(&self.bus);

        self.enable_gate(R_PRCM_BASE, &R_PRCM_R_PIO);
        self.pio.init();

        self.enable_gate(R_PRCM_BASE, &R_PRCM_R_RSB);
        self.pio.set_pin_function(0, RSB_PIN_FUNCTION);
        self.pio.set_pin_function(1, RSB_PIN_FUNCTION);

        self.pmic.init()
    }

    fn enable_clock(&mut self, clock: Clock) {
        match clock {
            Clock::Msgbox => self.enable_gate(CCU_BASE, &CCU_MSGBOX),
        }
    }

    fn pmic_suspend(&mut self) -> Result<(), ScpError> {
        self.pmic.suspend()
    }

    fn pmic_resume(&mut self) -> Result<(), ScpError> {
        self.pmic.resume()
    }

    fn pmic_shutdown(&mut self) -> Result<(), ScpError> {
        self.pmic.shutdown()
    }

    fn pmic_reset(&mut self) -> Result<(), ScpError> {
        self.pmic.reset()
    }

    fn enable_wakeup(&mut self) {
        self.pio.enable_wakeup();
    }

    fn disable_wakeup(&mut self) {
        self.pio.disable_wakeup();
    }

    fn pmic_irq(&mut self, state: SystemState) -> Result<IrqOutcome, ScpError> {
        self.pmic.irq(state)
    }

    fn wakeup_irq(&mut self, state: SystemState) -> IrqOutcome {
        self.pio.irq(state)
    }
}

// Provided by the architecture startup code linked into the firmware image.
#[cfg(not(test))]
extern "C" {
    fn arch_disable_interrupts() -> u32;
    fn arch_restore_interrupts(flags: u32);
    fn arch_restart() -> !;
}

#[cfg(not(test))]
impl InterruptControl for A64Platform<Mmio> {
    fn disable_interrupts(&self) -> IrqFlags {
        // SAFETY: only changes the interrupt-enable bit of the status register.
        IrqFlags(unsafe { arch_disable_interrupts() })
    }

    fn restore_interrupts(&self, flags: IrqFlags) {
        // SAFETY: `flags` came from `arch_disable_interrupts`.
        unsafe { arch_restore_interrupts(flags.0) }
    }
}

#[cfg(not(test))]
impl Platform for A64Platform<Mmio> {
    type Bus = Mmio;
    type Css = Coordinator<A64Hooks<Mmio>>;

    const DEVICES: DeviceMap = DEVICES;

    fn bus(&self) -> Mmio {
        self.bus
    }

    fn restart(&mut self) -> ! {
        // SAFETY: jumps to the reset vector; nothing runs after this.
        unsafe { arch_restart() }
    }
}
