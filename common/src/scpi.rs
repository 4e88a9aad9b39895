//! SCPI wire format
//!
//! Definitions for the System Control and Power Interface messages exchanged
//! with the application processors through shared memory. Everything here is
//! expressed in terms of the 32-bit words the SCP reads and writes on the
//! shared-memory bus; the transport guarantees that 32-bit words look the same
//! from both sides.
//!
//! Message layout (one 256-byte slot per direction per client):
//!
//! ```text
//! word 0   [7:0] command   [15:8] sender   [31:16] payload size (bytes)
//! word 1   [31:0] status
//! word 2.. payload, up to PAYLOAD_WORDS words
//! ```

use core::fmt;

use static_assertions::const_assert;
use strum::{EnumCount, FromRepr};

use crate::power::PowerState;

/// Size of one message slot in shared memory.
pub const MESSAGE_SIZE: usize = 0x100;
/// Size of the fixed message header.
pub const HEADER_SIZE: usize = 8;
/// Largest payload a message can carry, in bytes.
pub const PAYLOAD_SIZE: usize = MESSAGE_SIZE - HEADER_SIZE;
/// Largest payload a message can carry, in 32-bit words.
pub const PAYLOAD_WORDS: usize = PAYLOAD_SIZE / 4;

/// Doorbell value identifying a SCPI message on a mailbox channel.
pub const VIRTUAL_CHANNEL: u32 = 1 << 0;

/// Sender identity used for messages originated by the SCP.
pub const SENDER_SCP: u8 = 0;

/// SCPI protocol version reported by Get capabilities.
pub const PROTOCOL_VERSION: (u16, u16) = (1, 2);

const_assert!(HEADER_SIZE + PAYLOAD_WORDS * 4 == MESSAGE_SIZE);

/// SCPI command opcodes implemented by this firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, EnumCount)]
#[repr(u8)]
pub enum Command {
    /// SCP ready announcement (SCP -> secure client, one way)
    ScpReady = 0,
    /// Get SCP capabilities
    GetScpCap = 1,
    /// Set CSS (core/cluster/subsystem) power state
    SetCssPower = 2,
    /// Get CSS power state
    GetCssPower = 3,
    /// Set system power state
    SetSysPower = 4,
}

impl Command {
    pub const fn opcode(self) -> u8 {
        self as u8
    }
}

/// Reply status codes. Values are fixed by the SCPI protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u32)]
pub enum Status {
    Ok = 0,
    BadParameter = 1,
    BadAlignment = 2,
    BadSize = 3,
    BadHandler = 4,
    AccessDenied = 5,
    OutOfRange = 6,
    Timeout = 7,
    NoMemory = 8,
    BadPowerState = 9,
    NotSupported = 10,
    DeviceError = 11,
    Busy = 12,
    OsError = 13,
    BadData = 14,
    BadState = 15,
}

impl Status {
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Convert a `Status` into a `Result`, treating everything but `Ok` as an error.
    pub fn into_result(self) -> Result<(), Status> {
        match self {
            Status::Ok => Ok(()),
            err => Err(err),
        }
    }
}

impl From<Result<(), Status>> for Status {
    fn from(result: Result<(), Status>) -> Self {
        match result {
            Ok(()) => Status::Ok,
            Err(status) => status,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "Success"),
            Status::BadParameter => write!(f, "Invalid parameter"),
            Status::BadAlignment => write!(f, "Invalid alignment"),
            Status::BadSize => write!(f, "Invalid payload size"),
            Status::BadHandler => write!(f, "Invalid handler or command"),
            Status::AccessDenied => write!(f, "Access denied"),
            Status::OutOfRange => write!(f, "Value out of range"),
            Status::Timeout => write!(f, "Timed out"),
            Status::NoMemory => write!(f, "Out of memory"),
            Status::BadPowerState => write!(f, "Invalid power state"),
            Status::NotSupported => write!(f, "Not supported"),
            Status::DeviceError => write!(f, "Device error"),
            Status::Busy => write!(f, "Device busy"),
            Status::OsError => write!(f, "OS error"),
            Status::BadData => write!(f, "Unexpected data"),
            Status::BadState => write!(f, "Invalid state"),
        }
    }
}

/// Callers of the SCPI protocol. Identity is fixed by the mailbox channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Client {
    /// Trusted firmware (EL3)
    Secure = 0,
    /// Rich OS / hypervisor (EL2)
    NonSecure = 1,
}

/// Number of SCPI clients.
pub const CLIENT_COUNT: usize = 2;

impl Client {
    pub const ALL: [Client; CLIENT_COUNT] = [Client::Secure, Client::NonSecure];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Requests accepted by Set system power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum SystemPowerRequest {
    Shutdown = 0,
    Reboot = 1,
    Reset = 2,
}

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    pub command: u8,
    pub sender: u8,
    /// Payload size in bytes
    pub size: u16,
    pub status: u32,
}

impl MessageHeader {
    /// Decode the two header words read from shared memory.
    pub const fn decode(words: [u32; 2]) -> Self {
        MessageHeader {
            command: words[0] as u8,
            sender: (words[0] >> 8) as u8,
            size: (words[0] >> 16) as u16,
            status: words[1],
        }
    }

    /// Encode into the two header words written to shared memory.
    pub const fn encode(&self) -> [u32; 2] {
        [
            self.command as u32 | (self.sender as u32) << 8 | (self.size as u32) << 16,
            self.status,
        ]
    }
}

/// A complete SCPI message, held in SCP-private memory.
///
/// Messages are copied in from and out to shared memory as a whole, so the
/// peer never observes a partially built reply.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub payload: [u32; PAYLOAD_WORDS],
}

impl Message {
    pub const fn new() -> Self {
        Message {
            header: MessageHeader {
                command: 0,
                sender: 0,
                size: 0,
                status: 0,
            },
            payload: [0; PAYLOAD_WORDS],
        }
    }

    /// Payload size in bytes, clamped to the slot capacity.
    pub fn payload_len(&self) -> usize {
        usize::from(self.header.size).min(PAYLOAD_SIZE)
    }

    /// Number of payload words that carry data.
    pub fn payload_words(&self) -> usize {
        self.payload_len().div_ceil(4)
    }

    /// Set the payload size in bytes.
    pub fn set_payload_len(&mut self, len: usize) {
        debug_assert!(len <= PAYLOAD_SIZE, "payload_len must be <= {}", PAYLOAD_SIZE);
        self.header.size = len.min(PAYLOAD_SIZE) as u16;
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("header", &self.header)
            .field("payload", &&self.payload[..self.payload_words()])
            .finish()
    }
}

/// Set CSS power request, packed into one 32-bit word.
///
/// ```text
/// [3:0] core   [7:4] cluster   [11:8] core state
/// [15:12] cluster state   [19:16] CSS state
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CssPowerRequest {
    pub core: u8,
    pub cluster: u8,
    pub core_state: PowerState,
    pub cluster_state: PowerState,
    pub css_state: PowerState,
}

impl CssPowerRequest {
    pub const fn decode(word: u32) -> Self {
        CssPowerRequest {
            core: (word & 0xf) as u8,
            cluster: ((word >> 4) & 0xf) as u8,
            core_state: PowerState::from_raw((word >> 8) as u8),
            cluster_state: PowerState::from_raw((word >> 12) as u8),
            css_state: PowerState::from_raw((word >> 16) as u8),
        }
    }

    pub const fn encode(&self) -> u32 {
        (self.core as u32 & 0xf)
            | (self.cluster as u32 & 0xf) << 4
            | (self.core_state.raw() as u32) << 8
            | (self.cluster_state.raw() as u32) << 12
            | (self.css_state.raw() as u32) << 16
    }
}

/// Per-cluster entry of the Get CSS power reply.
///
/// ```text
/// [3:0] cluster id   [7:4] cluster power state   [15:8] online core bitmap
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterPowerDescriptor {
    pub cluster: u8,
    pub state: PowerState,
    pub online_cores: u8,
}

impl ClusterPowerDescriptor {
    pub const fn encode(&self) -> u16 {
        (self.cluster as u16 & 0xf)
            | (self.state.raw() as u16) << 4
            | (self.online_cores as u16) << 8
    }

    pub const fn decode(raw: u16) -> Self {
        ClusterPowerDescriptor {
            cluster: (raw & 0xf) as u8,
            state: PowerState::from_raw((raw >> 4) as u8),
            online_cores: (raw >> 8) as u8,
        }
    }
}

/// Pack 16-bit cluster descriptors into payload words.
///
/// The shared-memory path swaps byte lanes so that whole 32-bit words read the
/// same on both sides, which means sub-word elements do not. To make the
/// application processor read descriptor `i` as the `i`-th little-endian
/// halfword, the SCP stores it in word `i / 2` at bit offset `16 * (i % 2)`.
///
/// Returns the payload size in bytes. Descriptors that do not fit are dropped.
pub fn pack_cluster_descriptors(descriptors: &[u16], payload: &mut [u32]) -> usize {
    let count = descriptors.len().min(payload.len() * 2);
    for word in payload.iter_mut().take(count.div_ceil(2)) {
        *word = 0;
    }
    for (i, &descriptor) in descriptors.iter().take(count).enumerate() {
        payload[i / 2] |= u32::from(descriptor) << (16 * (i % 2));
    }
    count * core::mem::size_of::<u16>()
}

/// Bitmap of implemented opcodes within a 32-opcode command group.
pub const fn command_group_bitmap(commands: &[Command], group: usize) -> u32 {
    let mut bitmap = 0;
    let mut i = 0;
    while i < commands.len() {
        let opcode = commands[i] as usize;
        if opcode / 32 == group {
            bitmap |= 1 << (opcode % 32);
        }
        i += 1;
    }
    bitmap
}

/// Payload of the Get capabilities reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub protocol_version: (u16, u16),
    pub max_rx_payload: u16,
    pub max_tx_payload: u16,
    /// (major, minor, patch)
    pub firmware_version: (u8, u8, u16),
    /// One bitmap per 32-opcode command group
    pub commands: [u32; 4],
}

impl Capabilities {
    /// Number of payload words in an encoded capability reply.
    pub const WORDS: usize = 7;

    pub fn encode(&self, payload: &mut [u32]) -> usize {
        let words = [
            u32::from(self.protocol_version.0) << 16 | u32::from(self.protocol_version.1),
            u32::from(self.max_rx_payload) << 16 | u32::from(self.max_tx_payload),
            u32::from(self.firmware_version.0) << 24
                | u32::from(self.firmware_version.1) << 16
                | u32::from(self.firmware_version.2),
            self.commands[0],
            self.commands[1],
            self.commands[2],
            self.commands[3],
        ];
        payload[..Self::WORDS].copy_from_slice(&words);
        Self::WORDS * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_word_layout() {
        let header = MessageHeader {
            command: Command::SetSysPower.opcode(),
            sender: 0x5a,
            size: 1,
            status: Status::BadSize.code(),
        };
        assert_eq!(header.encode(), [0x0001_5a04, 3]);
        assert_eq!(MessageHeader::decode([0x0001_5a04, 3]), header);
    }

    #[test]
    fn test_css_power_request_fields() {
        // core 1, cluster 0, core off, cluster on, css on
        let req = CssPowerRequest::decode(0x0000_0301);
        assert_eq!(req.core, 1);
        assert_eq!(req.cluster, 0);
        assert_eq!(req.core_state, PowerState::OFF);
        assert_eq!(req.cluster_state, PowerState::ON);
        assert_eq!(req.css_state, PowerState::ON);

        let all_off = CssPowerRequest::decode(0x0003_3320);
        assert_eq!(all_off.cluster, 2);
        assert_eq!(all_off.css_state, PowerState::OFF);
        assert_eq!(all_off.encode(), 0x0003_3320);
    }

    #[test]
    fn test_cluster_descriptor_bits() {
        let desc = ClusterPowerDescriptor {
            cluster: 1,
            state: PowerState::RETENTION,
            online_cores: 0b1011,
        };
        assert_eq!(desc.encode(), 0x0b11);
        assert_eq!(ClusterPowerDescriptor::decode(0x0b11), desc);
    }

    #[test]
    fn test_cluster_descriptors_byte_order() {
        let mut payload = [0xffff_ffffu32; 2];
        let len = pack_cluster_descriptors(&[0x0f00, 0x0131, 0x0032], &mut payload);
        assert_eq!(len, 6);

        // Bytes as the application processor reads them (little-endian words).
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&payload[0].to_le_bytes());
        bytes[4..].copy_from_slice(&payload[1].to_le_bytes());
        assert_eq!(&bytes[..6], &[0x00, 0x0f, 0x31, 0x01, 0x32, 0x00]);
    }

    #[test]
    fn test_cluster_descriptors_truncate_to_payload() {
        let mut payload = [0u32; 1];
        let len = pack_cluster_descriptors(&[1, 2, 3], &mut payload);
        assert_eq!(len, 4);
        assert_eq!(payload[0], 0x0002_0001);
    }

    #[test]
    fn test_capabilities_layout() {
        let caps = Capabilities {
            protocol_version: PROTOCOL_VERSION,
            max_rx_payload: PAYLOAD_SIZE as u16,
            max_tx_payload: PAYLOAD_SIZE as u16,
            firmware_version: (0, 1, 0),
            commands: [0x1f, 0, 0, 0],
        };
        let mut payload = [0u32; PAYLOAD_WORDS];
        assert_eq!(caps.encode(&mut payload), 28);
        assert_eq!(
            &payload[..7],
            &[0x0001_0002, 0x00f8_00f8, 0x0001_0000, 0x1f, 0, 0, 0]
        );
    }

    #[test]
    fn test_command_group_bitmap() {
        let all = [
            Command::ScpReady,
            Command::GetScpCap,
            Command::SetCssPower,
            Command::GetCssPower,
            Command::SetSysPower,
        ];
        assert_eq!(command_group_bitmap(&all, 0), 0b1_1111);
        assert_eq!(command_group_bitmap(&all, 1), 0);
        assert_eq!(Command::COUNT, 5);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::from_repr(10), Some(Status::NotSupported));
        assert_eq!(Status::AccessDenied.code(), 5);
        assert_eq!(Status::from(Err(Status::BadParameter)), Status::BadParameter);
        assert_eq!(Status::Ok.into_result(), Ok(()));
    }

    #[test]
    fn test_message_payload_len_clamped() {
        let mut msg = Message::new();
        msg.header.size = 0xffff;
        assert_eq!(msg.payload_len(), PAYLOAD_SIZE);
        msg.set_payload_len(5);
        assert_eq!(msg.payload_words(), 2);
    }
}
