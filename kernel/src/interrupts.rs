//! Interrupt model
//!
//! The SCP has one physical thread and one global interrupt-enable flag. The
//! only locking primitive is disabling that flag, which is represented here
//! by a [`CriticalSection`] token: code that needs exclusive access to shared
//! firmware state takes `&CriticalSection` and can only be called while the
//! flag is clear.
//!
//! This module also holds the external-interrupt entry point, which chains
//! the interrupt controller to the PMIC, wakeup-GPIO and mailbox handlers.

use core::marker::PhantomData;

use crate::firmware::Scp;
use crate::platform::{IrqOutcome, Platform};

/// Saved interrupt-enable state, returned by [`InterruptControl::disable_interrupts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqFlags(pub u32);

/// Control of the CPU's global interrupt-enable flag.
pub trait InterruptControl {
    /// Clear the interrupt-enable flag, returning its previous state.
    fn disable_interrupts(&self) -> IrqFlags;

    /// Restore the interrupt-enable flag saved by `disable_interrupts`.
    fn restore_interrupts(&self, flags: IrqFlags);
}

/// Proof that interrupts are disabled for the lifetime `'cs`.
pub struct CriticalSection<'cs> {
    _private: PhantomData<&'cs ()>,
}

impl CriticalSection<'_> {
    /// # Safety
    ///
    /// Interrupts must be disabled for as long as the token lives.
    pub unsafe fn new() -> Self {
        CriticalSection {
            _private: PhantomData,
        }
    }
}

/// Interrupt lines of the R_INTC with a dedicated handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptIndex {
    /// PMIC interrupt output
    Nmi = 0x00,
    /// GPIO port L (power button, wakeup sources)
    PioPortL = 0x0d,
    Msgbox = 0x11,
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl<P: Platform> Scp<P> {
    /// Run `f` with interrupts disabled and a critical-section token. Nests:
    /// the inner call restores the still-disabled state.
    pub fn critical<R>(&mut self, f: impl FnOnce(&mut Self, &CriticalSection<'_>) -> R) -> R {
        let flags = self.platform.disable_interrupts();
        // SAFETY: interrupts stay disabled until `restore_interrupts` below.
        let cs = unsafe { CriticalSection::new() };
        let ret = f(self, &cs);
        self.platform.restore_interrupts(flags);
        ret
    }

    /// External interrupt entry point.
    ///
    /// Handles the line reported by the interrupt controller. The line may
    /// already have been serviced by the application processors through their
    /// own interrupt controller, so a line that is no longer pending is
    /// ignored. Lines nobody claims are forwarded to the guest OS.
    pub fn handle_interrupt(&mut self) {
        let irq = self.intc.current_irq();

        if !self.intc.is_pending(irq) {
            return;
        }

        let handled = if irq == InterruptIndex::Nmi.as_u8() {
            match self.platform.pmic_irq(self.system.state()) {
                Ok(outcome) => self.apply_irq_outcome(outcome),
                Err(err) => {
                    self.check_board("PMIC IRQ", Err(err));
                    false
                }
            }
        } else if irq == InterruptIndex::PioPortL.as_u8() {
            let outcome = self.platform.wakeup_irq(self.system.state());
            self.apply_irq_outcome(outcome)
        } else if irq == InterruptIndex::Msgbox.as_u8() {
            self.poll_and_dispatch()
        } else {
            false
        };

        if !handled {
            self.forward_irq(irq);
        }

        self.intc.clear_pending(irq);
    }

    fn apply_irq_outcome(&mut self, outcome: IrqOutcome) -> bool {
        match outcome {
            IrqOutcome::NotMine => false,
            IrqOutcome::Handled => true,
            IrqOutcome::Wakeup => {
                log::info!("Wakeup event");
                self.system_resume();
                true
            }
            IrqOutcome::PowerOff => {
                log::warn!("Emergency power off");
                self.system_shutdown();
                true
            }
        }
    }
}
