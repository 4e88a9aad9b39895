#![no_std]

//! Shared wire-level definitions for the SCP firmware
//!
//! This crate contains the formats exchanged with the application processors:
//! SCPI messages, IRQ forwarding requests, and the mailbox channel map.
//! No driver or state-machine logic belongs here - only definitions and the
//! explicit encode/decode functions for bit-packed words.

pub mod power;
pub mod scpi;

/// Mailbox channel numbering
///
/// Channel `2k` carries requests from SCPI client `k`, channel `2k + 1` carries
/// replies to it. The IRQ forwarding pair sits outside the client range.
pub mod mailbox {
    use crate::scpi::Client;

    pub const CHAN_SCPI_EL3_RX: u8 = 0;
    pub const CHAN_SCPI_EL3_TX: u8 = 1;
    pub const CHAN_SCPI_EL2_RX: u8 = 2;
    pub const CHAN_SCPI_EL2_TX: u8 = 3;
    pub const CHAN_IRQF_EL2_RX: u8 = 6;
    pub const CHAN_IRQF_EL2_TX: u8 = 7;
    /// Number of hardware channels
    pub const CHAN_COUNT: u8 = 8;

    /// Request channel of a SCPI client.
    pub const fn rx_channel(client: Client) -> u8 {
        client as u8 * 2
    }

    /// Reply channel of a SCPI client.
    pub const fn tx_channel(client: Client) -> u8 {
        client as u8 * 2 + 1
    }

    /// True for channels the SCP receives on.
    pub const fn is_rx(chan: u8) -> bool {
        chan < CHAN_COUNT && chan % 2 == 0
    }

    /// True for channels the SCP transmits on.
    pub const fn is_tx(chan: u8) -> bool {
        chan < CHAN_COUNT && chan % 2 == 1
    }
}

/// IRQ forwarding wire format
///
/// One 32-bit word: `[7:0]` interrupt number, `[15:8]` request opcode.
pub mod irqf {
    use strum::FromRepr;

    /// Requests a guest OS can make about a forwarded interrupt line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
    #[repr(u8)]
    pub enum IrqfOp {
        /// End of interrupt: the guest has serviced the line
        Eoi = 0,
        Mask = 1,
        Unmask = 2,
    }

    /// A decoded request word. `op` is `Err` with the raw byte if unknown.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqfRequest {
        pub irq: u8,
        pub op: Result<IrqfOp, u8>,
    }

    impl IrqfRequest {
        pub fn decode(word: u32) -> Self {
            let irq = word as u8;
            let raw_op = (word >> 8) as u8;
            IrqfRequest {
                irq,
                op: IrqfOp::from_repr(raw_op).ok_or(raw_op),
            }
        }

        pub const fn encode(irq: u8, op: IrqfOp) -> u32 {
            irq as u32 | (op as u32) << 8
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_decode_request() {
            let req = IrqfRequest::decode(0x0000_0105);
            assert_eq!(req.irq, 5);
            assert_eq!(req.op, Ok(IrqfOp::Mask));
            assert_eq!(IrqfRequest::decode(0x0203).op, Ok(IrqfOp::Unmask));
            assert_eq!(IrqfRequest::decode(0x0003).op, Ok(IrqfOp::Eoi));
        }

        #[test]
        fn test_decode_unknown_op() {
            let req = IrqfRequest::decode(0xdead_0907);
            assert_eq!(req.irq, 7);
            assert_eq!(req.op, Err(9));
        }

        #[test]
        fn test_encode() {
            assert_eq!(IrqfRequest::encode(5, IrqfOp::Unmask), 0x0205);
        }
    }
}

/// Firmware error categories surfaced outside the SCPI status space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScpError {
    /// Mailbox transport failure
    Transport,
    /// Sideband bus (RSB/I2C) transaction failed
    Bus,
    /// Requested operation has no implementation on this board
    Unsupported,
}
