//! Build-time firmware configuration
//!
//! There is no persisted configuration; everything the firmware needs to know
//! about timing and limits is fixed here at compile time.

/// Reference clock feeding the free-running counter (24 MHz).
pub const CLK_MHZ: u32 = 24;
pub const CLK_KHZ: u32 = CLK_MHZ * 1000;

/// How long to wait for a client to acknowledge the previous reply before
/// overwriting its transmit buffer (100 ms).
pub const TX_ACK_TIMEOUT_CYCLES: u32 = 100 * CLK_KHZ;

/// Delay between polls of a full mailbox FIFO.
pub const MAILBOX_SEND_RETRY_US: u32 = 10;

/// Number of polls before a send to a full FIFO gives up with `Busy` (1 ms).
pub const MAILBOX_SEND_RETRIES: u32 = 100;

/// Watchdog interval programmed at init (500 ms).
pub const WATCHDOG_INTERVAL_CYCLES: u32 = 500 * CLK_KHZ;

/// Firmware version reported by Get capabilities: (major, minor, patch).
pub const FIRMWARE_VERSION: (u8, u8, u16) = (0, 1, 0);

/// Depth of the interrupt-fed mailbox message queue (power of 2).
pub const MESSAGE_QUEUE_DEPTH: usize = 16;

/// Largest topology the power coordination tables can describe.
pub const MAX_CLUSTERS: usize = 4;
pub const MAX_CORES_PER_CLUSTER: usize = 8;
