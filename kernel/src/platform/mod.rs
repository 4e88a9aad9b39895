//! Platform capability interfaces
//!
//! A platform is selected at build time and handed to [`Scp::new`] by value,
//! so every call through these traits is statically dispatched.
//!
//! - [`Board`]: the narrow interfaces to collaborators outside the core
//!   (clock gates, PMIC, wakeup GPIOs)
//! - [`Platform`]: the register bus, device map, interrupt flag, power
//!   coordination implementation and the firmware restart path
//!
//! [`Scp::new`]: crate::firmware::Scp::new

pub mod sun50i_a64;

use scp_common::ScpError;

use crate::css::Css;
use crate::interrupts::InterruptControl;
use crate::mmio::RegisterBus;
use crate::system::SystemState;

/// Base addresses of the devices the core drives directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceMap {
    pub msgbox: usize,
    pub r_intc: usize,
    pub r_twd: usize,
    /// Start of the SCPI shared-memory areas
    pub scpi_mem: usize,
}

/// Bus clocks the core asks the board to ungate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    Msgbox,
}

/// Result of offering an interrupt to a board-level handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqOutcome {
    /// Not raised by this device
    NotMine,
    Handled,
    /// Handled, and it was a request to wake the system
    Wakeup,
    /// Handled, and the system must be powered off (e.g. PMIC overheat)
    PowerOff,
}

/// Board-level collaborators, reached only through these calls.
pub trait Board {
    /// Bring up board devices (clock tree, GPIO, PMIC) before the core.
    fn init(&mut self) -> Result<(), ScpError> {
        Ok(())
    }

    fn enable_clock(&mut self, clock: Clock);

    /// Put the PMIC into its suspend configuration (rails for the CSS off).
    fn pmic_suspend(&mut self) -> Result<(), ScpError>;
    fn pmic_resume(&mut self) -> Result<(), ScpError>;
    /// Ask the PMIC to power the system off.
    fn pmic_shutdown(&mut self) -> Result<(), ScpError>;
    /// Ask the PMIC to power-cycle the system.
    fn pmic_reset(&mut self) -> Result<(), ScpError>;

    fn enable_wakeup(&mut self);
    fn disable_wakeup(&mut self);

    /// PMIC interrupt (NMI line). A failure to talk to the PMIC is
    /// reported as an error, not as an outcome.
    fn pmic_irq(&mut self, _state: SystemState) -> Result<IrqOutcome, ScpError> {
        Ok(IrqOutcome::NotMine)
    }

    /// GPIO port L interrupt (power button and other wakeup sources).
    fn wakeup_irq(&mut self, _state: SystemState) -> IrqOutcome {
        IrqOutcome::NotMine
    }
}

/// Everything the core needs from the SoC it runs on.
pub trait Platform: InterruptControl + Board {
    type Bus: RegisterBus + Copy;
    type Css: Css;

    const DEVICES: DeviceMap;

    fn bus(&self) -> Self::Bus;

    /// Restart this firmware from its entry point.
    fn restart(&mut self) -> !;
}
