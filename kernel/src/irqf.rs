//! Interrupt forwarding
//!
//! Interrupt lines the SCP has no handler for belong to the rich OS. When one
//! fires it is masked locally and its number is sent on the forwarding
//! channel; the OS then drives the line through mask, unmask and EOI
//! requests on the return channel.

use scp_common::irqf::{IrqfOp, IrqfRequest};
use scp_common::mailbox::{CHAN_IRQF_EL2_RX, CHAN_IRQF_EL2_TX};

use crate::firmware::Scp;
use crate::intc::IRQ_COUNT;
use crate::mailbox::MailboxError;
use crate::platform::Platform;
use crate::system::SystemState;

/// Lines the OS has explicitly masked. An EOI never reopens them.
#[derive(Debug, Default)]
pub struct IrqForwarder {
    client_masked: u32,
}

impl IrqForwarder {
    pub const fn new() -> Self {
        IrqForwarder { client_masked: 0 }
    }

    pub fn is_client_masked(&self, irq: u8) -> bool {
        self.client_masked & 1 << irq != 0
    }

    fn set_client_masked(&mut self, irq: u8, masked: bool) {
        if masked {
            self.client_masked |= 1 << irq;
        } else {
            self.client_masked &= !(1 << irq);
        }
    }
}

impl<P: Platform> Scp<P> {
    pub(crate) fn irqf_init(&mut self) {
        self.mailbox.enable_rx(CHAN_IRQF_EL2_RX);
    }

    /// Handle one request word from the OS.
    pub fn irqf_receive(&mut self, word: u32) {
        let request = IrqfRequest::decode(word);
        let irq = request.irq;

        if irq >= IRQ_COUNT {
            log::warn!("IRQF: Bad IRQ {} in request {:#010x}", irq, word);
            return;
        }

        match request.op {
            Ok(IrqfOp::Eoi) => {
                if !self.irqf.is_client_masked(irq) {
                    self.intc.unmask(irq);
                }
            }
            Ok(IrqfOp::Mask) => {
                self.irqf.set_client_masked(irq, true);
                self.intc.mask(irq);
            }
            Ok(IrqfOp::Unmask) => {
                self.irqf.set_client_masked(irq, false);
                self.intc.unmask(irq);
            }
            Err(_) => log::warn!("IRQF: Unknown request {:#010x}", word),
        }
    }

    /// Forward an interrupt nobody on the SCP claimed.
    ///
    /// The line stays masked until the OS acknowledges it. Nothing is sent
    /// unless the OS is running, and a full channel drops the forward.
    pub fn forward_irq(&mut self, irq: u8) {
        self.intc.mask(irq);

        if self.system.state() != SystemState::Runtime {
            return;
        }

        match self.mailbox_send(CHAN_IRQF_EL2_TX, u32::from(irq)) {
            Ok(()) | Err(MailboxError::Busy) => {}
            Err(err) => {
                log::error!("IRQF: Unable to forward IRQ {}: {}", irq, err);
                self.fatal("IRQ forwarding failed");
            }
        }
    }
}
