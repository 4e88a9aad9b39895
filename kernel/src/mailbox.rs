//! Message box driver
//!
//! Eight unidirectional hardware channels, each a small FIFO of 32-bit words.
//! Even channels carry words from the application processors to the SCP, odd
//! channels the other way. Received words are drained into the firmware's
//! [`MessageQueue`](crate::ipc::MessageQueue) and routed to the SCPI or IRQ
//! forwarding service by channel number.

use core::fmt;

use scp_common::mailbox::{
    self, CHAN_COUNT, CHAN_IRQF_EL2_RX, CHAN_SCPI_EL2_RX, CHAN_SCPI_EL3_RX,
};
use scp_common::scpi::Client;

use crate::config::{MAILBOX_SEND_RETRIES, MAILBOX_SEND_RETRY_US};
use crate::firmware::Scp;
use crate::interrupts::{CriticalSection, InterruptIndex};
use crate::ipc::Envelope;
use crate::mmio::{bit, genmask, RegisterBus};
use crate::platform::{Clock, Platform};
use crate::watchdog::Watchdog;

/// Even channels receive, odd channels transmit.
const CTRL_NORMAL: u32 = 0x0110_0110;

const CTRL_REG0: usize = 0x0000;
const CTRL_REG1: usize = 0x0004;
const IRQ_EN_REG: usize = 0x0040;
/// Write-one-to-clear
const IRQ_STAT_REG: usize = 0x0050;
const ARM_IRQ_STAT_REG: usize = 0x0070;

const fn fifo_stat_reg(chan: u8) -> usize {
    0x0100 + 4 * chan as usize
}

const fn msg_stat_reg(chan: u8) -> usize {
    0x0140 + 4 * chan as usize
}

const fn msg_data_reg(chan: u8) -> usize {
    0x0180 + 4 * chan as usize
}

/// Receive-pending status bit of a channel, in either status register.
const fn rx_irq(chan: u8) -> u32 {
    bit(2 * chan as u32)
}

const FIFO_FULL: u32 = bit(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    /// The channel FIFO stayed full for the whole retry budget
    Busy,
    /// Not a transmit channel
    InvalidChannel,
}

impl fmt::Display for MailboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailboxError::Busy => write!(f, "mailbox FIFO full"),
            MailboxError::InvalidChannel => write!(f, "invalid mailbox channel"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Msgbox<B> {
    bus: B,
    base: usize,
}

impl<B: RegisterBus> Msgbox<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Msgbox { bus, base }
    }

    /// Configure channel directions, drain stale words and clear all
    /// interrupt state. The bus clock must already be running.
    pub fn init(&self) {
        self.bus.write32(self.base + CTRL_REG0, CTRL_NORMAL);
        self.bus.write32(self.base + CTRL_REG1, CTRL_NORMAL);

        // Words left in a receive FIFO keep its status bit asserted.
        for chan in (0..CHAN_COUNT).filter(|&c| mailbox::is_rx(c)) {
            while self.has_data(chan) {
                self.bus.read32(self.base + msg_data_reg(chan));
            }
        }

        self.bus.write32(self.base + IRQ_EN_REG, 0);
        self.bus.write32(self.base + IRQ_STAT_REG, genmask(15, 0));
    }

    /// Enable the receive interrupt of `chan`.
    pub fn enable_rx(&self, chan: u8) {
        if mailbox::is_rx(chan) {
            self.bus.set32(self.base + IRQ_EN_REG, rx_irq(chan));
        }
    }

    /// True once the peer has drained everything sent on `chan`.
    pub fn last_tx_done(&self, chan: u8) -> bool {
        !self.bus.get32(self.base + ARM_IRQ_STAT_REG, rx_irq(chan))
    }

    /// Push one word into the transmit FIFO of `chan`, polling a full FIFO
    /// every few microseconds for a bounded number of attempts.
    pub fn send(&self, delay: &Watchdog<B>, chan: u8, word: u32) -> Result<(), MailboxError> {
        if !mailbox::is_tx(chan) {
            return Err(MailboxError::InvalidChannel);
        }

        let mut retries = 0;
        while self.bus.get32(self.base + fifo_stat_reg(chan), FIFO_FULL) {
            if retries == MAILBOX_SEND_RETRIES {
                return Err(MailboxError::Busy);
            }
            delay.udelay(MAILBOX_SEND_RETRY_US);
            retries += 1;
        }

        self.bus.write32(self.base + msg_data_reg(chan), word);
        Ok(())
    }

    fn has_data(&self, chan: u8) -> bool {
        self.bus.read32(self.base + msg_stat_reg(chan)) != 0
    }

    fn rx_pending(&self) -> u32 {
        self.bus.read32(self.base + IRQ_STAT_REG)
    }

    fn ack_rx(&self, chan: u8) {
        self.bus.write32(self.base + IRQ_STAT_REG, rx_irq(chan));
    }

    fn read(&self, chan: u8) -> u32 {
        self.bus.read32(self.base + msg_data_reg(chan))
    }
}

impl<P: Platform> Scp<P> {
    /// Ungate the message box, reset it, and route its line at the
    /// interrupt controller.
    pub(crate) fn mailbox_init(&mut self) {
        self.platform.enable_clock(Clock::Msgbox);
        self.mailbox.init();
        self.intc.enable(InterruptIndex::Msgbox.as_u8());
    }

    pub(crate) fn mailbox_send(&self, chan: u8, word: u32) -> Result<(), MailboxError> {
        self.mailbox.send(&self.twd, chan, word)
    }

    /// Message box interrupt handler.
    ///
    /// Drains every receive channel with a pending status into the message
    /// queue, dispatches the queued words, and only then acknowledges the
    /// channel. Returns whether any channel was pending.
    pub fn poll_and_dispatch(&mut self) -> bool {
        let status = self.mailbox.rx_pending();
        let mut handled = false;

        for chan in (0..CHAN_COUNT).filter(|&c| mailbox::is_rx(c)) {
            if status & rx_irq(chan) == 0 {
                continue;
            }
            handled = true;

            while self.mailbox.has_data(chan) {
                let envelope = Envelope {
                    channel: chan,
                    word: self.mailbox.read(chan),
                };
                if let Err(envelope) = self.queue.enqueue(envelope) {
                    self.critical(|scp, cs| scp.dispatch_pending(cs));
                    if let Err(lost) = self.queue.enqueue(envelope) {
                        log::warn!(
                            "Mailbox: dropped word {:#010x} on channel {}",
                            lost.word,
                            lost.channel
                        );
                    }
                }
            }
            self.critical(|scp, cs| scp.dispatch_pending(cs));

            self.mailbox.ack_rx(chan);
        }

        handled
    }

    /// Hand every queued word to the service that owns its channel.
    pub(crate) fn dispatch_pending(&mut self, _cs: &CriticalSection<'_>) {
        while let Some(Envelope { channel, word }) = self.queue.dequeue() {
            match channel {
                CHAN_SCPI_EL3_RX => self.scpi_receive(Client::Secure, word),
                CHAN_SCPI_EL2_RX => self.scpi_receive(Client::NonSecure, word),
                CHAN_IRQF_EL2_RX => self.irqf_receive(word),
                _ => log::warn!("Mailbox: word {:#010x} on unused channel {}", word, channel),
            }
        }
    }
}
