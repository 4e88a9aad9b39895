//! SCPI command engine
//!
//! Each client owns a pair of message slots in shared SRAM. A doorbell on
//! the client's request channel means a request is waiting in its receive
//! slot; the reply goes to its transmit slot followed by a doorbell on the
//! reply channel. Requests are validated against a static command table
//! before their handler runs.
//!
//! ```text
//! doorbell -> wait tx done -> read request -> validate -> handler
//!          -> write reply -> doorbell (unless the command is one-way)
//! ```

use bitflags::bitflags;
use static_assertions::const_assert_eq;
use strum::EnumCount;

use scp_common::mailbox;
use scp_common::scpi::{
    command_group_bitmap, pack_cluster_descriptors, Capabilities, Client,
    ClusterPowerDescriptor, Command, CssPowerRequest, Message, MessageHeader, Status,
    SystemPowerRequest, CLIENT_COUNT, MESSAGE_SIZE, PAYLOAD_SIZE, PROTOCOL_VERSION,
    SENDER_SCP, VIRTUAL_CHANNEL,
};

use crate::config::{FIRMWARE_VERSION, MAX_CLUSTERS, TX_ACK_TIMEOUT_CYCLES};
use crate::css::Css;
use crate::firmware::Scp;
use crate::mmio::RegisterBus;
use crate::platform::Platform;
use crate::system::SystemState;

/// Size of one client's shared-memory area: transmit slot, then receive slot.
pub const AREA_SIZE: usize = 2 * MESSAGE_SIZE;

const TX_OFFSET: usize = 0;
const RX_OFFSET: usize = MESSAGE_SIZE;

/// The per-client message slots in shared SRAM.
#[derive(Debug, Clone, Copy)]
pub struct ScpiMemory<B> {
    bus: B,
    base: usize,
}

impl<B: RegisterBus> ScpiMemory<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        ScpiMemory { bus, base }
    }

    /// Areas are laid out in reverse order of client index.
    pub const fn area(&self, client: Client) -> usize {
        self.base + (CLIENT_COUNT - client.index() - 1) * AREA_SIZE
    }

    pub fn tx_slot(&self, client: Client) -> usize {
        self.area(client) + TX_OFFSET
    }

    pub fn rx_slot(&self, client: Client) -> usize {
        self.area(client) + RX_OFFSET
    }

    fn read_message(&self, slot: usize) -> Message {
        let mut msg = Message::new();
        msg.header = MessageHeader::decode([self.bus.read32(slot), self.bus.read32(slot + 4)]);
        let words = msg.payload_words();
        for (i, word) in msg.payload[..words].iter_mut().enumerate() {
            *word = self.bus.read32(slot + 8 + 4 * i);
        }
        msg
    }

    fn write_message(&self, slot: usize, msg: &Message) {
        let header = msg.header.encode();
        self.bus.write32(slot, header[0]);
        self.bus.write32(slot + 4, header[1]);
        for (i, &word) in msg.payload[..msg.payload_words()].iter().enumerate() {
            self.bus.write32(slot + 8 + 4 * i, word);
        }
    }

    pub fn read_request(&self, client: Client) -> Message {
        self.read_message(self.rx_slot(client))
    }

    pub fn write_reply(&self, client: Client, msg: &Message) {
        self.write_message(self.tx_slot(client), msg);
    }

    pub fn write_tx_header(&self, client: Client, header: &MessageHeader) {
        let words = header.encode();
        self.bus.write32(self.tx_slot(client), words[0]);
        self.bus.write32(self.tx_slot(client) + 4, words[1]);
    }

    /// Order the tx-done check before any later read of the slots.
    pub fn acquire(&self) {
        self.bus.fence_acquire();
    }

    /// Make every slot write visible before the next doorbell.
    pub fn release(&self) {
        self.bus.fence_release();
    }

    /// Command of whatever is currently in the transmit slot.
    pub fn tx_command(&self, client: Client) -> u8 {
        MessageHeader::decode([self.bus.read32(self.tx_slot(client)), 0]).command
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandFlags: u8 {
        /// One-way command: never send a reply
        const NO_REPLY = 1 << 0;
        /// Only the secure client may issue this command
        const SECURE = 1 << 1;
    }
}

type Handler<P> = fn(&mut Scp<P>, &Message, &mut Message) -> Status;

/// One entry of the command table.
pub struct CommandDescriptor<P: Platform> {
    pub command: Command,
    pub handler: Handler<P>,
    /// Exact request payload size in bytes
    pub rx_size: u16,
    pub flags: CommandFlags,
}

impl<P: Platform> Clone for CommandDescriptor<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: Platform> Copy for CommandDescriptor<P> {}

const_assert_eq!(Command::COUNT, 5);

impl<P: Platform> Scp<P> {
    /// Indexed by opcode.
    pub const COMMANDS: [CommandDescriptor<P>; Command::COUNT] = [
        CommandDescriptor {
            command: Command::ScpReady,
            handler: Self::scpi_scp_ready,
            rx_size: 0,
            flags: CommandFlags::NO_REPLY.union(CommandFlags::SECURE),
        },
        CommandDescriptor {
            command: Command::GetScpCap,
            handler: Self::scpi_get_scp_cap,
            rx_size: 0,
            flags: CommandFlags::empty(),
        },
        CommandDescriptor {
            command: Command::SetCssPower,
            handler: Self::scpi_set_css_power,
            rx_size: 4,
            flags: CommandFlags::NO_REPLY.union(CommandFlags::SECURE),
        },
        CommandDescriptor {
            command: Command::GetCssPower,
            handler: Self::scpi_get_css_power,
            rx_size: 0,
            flags: CommandFlags::empty(),
        },
        CommandDescriptor {
            command: Command::SetSysPower,
            handler: Self::scpi_set_sys_power,
            rx_size: 1,
            flags: CommandFlags::SECURE,
        },
    ];

    /// Enable the request channels and, on a cold boot, tell the secure
    /// client the SCP is ready.
    pub(crate) fn scpi_init(&mut self) {
        for client in Client::ALL {
            self.mailbox.enable_rx(mailbox::rx_channel(client));
        }

        if self.system.state() == SystemState::Boot {
            self.scpi_create_and_send(Client::Secure, Command::ScpReady);
        }
    }

    /// Doorbell received on a client's request channel.
    pub fn scpi_receive(&mut self, client: Client, word: u32) {
        // Other protocols share the channel.
        if word != VIRTUAL_CHANNEL {
            return;
        }
        self.scpi_handle_message(client);
    }

    /// Send a zero-payload message originated by the SCP.
    pub fn scpi_create_and_send(&mut self, client: Client, command: Command) {
        self.critical(|scp, _cs| {
            scp.scpi_wait_tx_done(client);
            scp.shmem.write_tx_header(
                client,
                &MessageHeader {
                    command: command.opcode(),
                    sender: SENDER_SCP,
                    size: 0,
                    status: Status::Ok.code(),
                },
            );
            scp.scpi_send(client);
        });
    }

    /// Process the request waiting in a client's receive slot.
    pub fn scpi_handle_message(&mut self, client: Client) {
        self.scpi_wait_tx_done(client);

        let rx = self.shmem.read_request(client);
        let mut tx = Message::new();
        tx.header = MessageHeader {
            command: rx.header.command,
            sender: rx.header.sender,
            size: 0,
            status: Status::NotSupported.code(),
        };

        let mut reply = true;
        if let Some(cmd) = Self::COMMANDS.get(usize::from(rx.header.command)).copied() {
            let status = if cmd.flags.contains(CommandFlags::SECURE) && client != Client::Secure {
                Status::AccessDenied
            } else if rx.header.size != cmd.rx_size {
                Status::BadSize
            } else {
                (cmd.handler)(self, &rx, &mut tx)
            };
            tx.header.status = status.code();
            reply = !cmd.flags.contains(CommandFlags::NO_REPLY);
        }

        log::debug!(
            "SCPI: {:?} cmd {} -> status {}",
            client,
            rx.header.command,
            tx.header.status
        );

        self.shmem.write_reply(client, &tx);
        if reply {
            self.scpi_send(client);
        }
    }

    /// Wait, within a time budget, for the client to consume our last
    /// message. On timeout the old reply is dropped and overwritten.
    fn scpi_wait_tx_done(&self, client: Client) {
        let chan = mailbox::tx_channel(client);
        let done = self
            .twd
            .poll_timeout(TX_ACK_TIMEOUT_CYCLES, || self.mailbox.last_tx_done(chan));
        self.shmem.acquire();

        if !done {
            log::warn!(
                "SCPI: Dropped reply to {:?} for command {}",
                client,
                self.shmem.tx_command(client)
            );
        }
    }

    /// Publish the transmit slot and ring the client's reply doorbell.
    fn scpi_send(&self, client: Client) {
        self.shmem.release();
        if let Err(err) = self.mailbox_send(mailbox::tx_channel(client), VIRTUAL_CHANNEL) {
            log::warn!("SCPI: Dropped reply to {:?}: {}", client, err);
        }
    }

    fn scpi_scp_ready(&mut self, _rx: &Message, _tx: &mut Message) -> Status {
        self.system_boot_complete();
        Status::Ok
    }

    fn scpi_get_scp_cap(&mut self, _rx: &Message, tx: &mut Message) -> Status {
        let implemented = Self::COMMANDS.map(|cmd| cmd.command);
        let caps = Capabilities {
            protocol_version: PROTOCOL_VERSION,
            max_rx_payload: PAYLOAD_SIZE as u16,
            max_tx_payload: PAYLOAD_SIZE as u16,
            firmware_version: FIRMWARE_VERSION,
            commands: [0, 1, 2, 3].map(|group| command_group_bitmap(&implemented, group)),
        };
        let len = caps.encode(&mut tx.payload);
        tx.set_payload_len(len);
        Status::Ok
    }

    fn scpi_set_css_power(&mut self, rx: &Message, _tx: &mut Message) -> Status {
        let request = CssPowerRequest::decode(rx.payload[0]);

        match self.critical(|scp, cs| scp.css.set_power_state(cs, request)) {
            Ok(state) => {
                // Everything off means the whole system is going to sleep.
                if state.css.is_off() {
                    self.system_suspend();
                }
                Status::Ok
            }
            Err(status) => status,
        }
    }

    fn scpi_get_css_power(&mut self, _rx: &Message, tx: &mut Message) -> Status {
        let clusters = self.css.cluster_count().min(MAX_CLUSTERS);
        let mut descriptors = [0u16; MAX_CLUSTERS];
        for (i, desc) in descriptors[..clusters].iter_mut().enumerate() {
            *desc = ClusterPowerDescriptor {
                cluster: i as u8,
                state: self.css.cluster_state(i),
                online_cores: self.css.online_cores(i),
            }
            .encode();
        }

        let len = pack_cluster_descriptors(&descriptors[..clusters], &mut tx.payload);
        tx.set_payload_len(len);
        Status::Ok
    }

    fn scpi_set_sys_power(&mut self, rx: &Message, _tx: &mut Message) -> Status {
        match SystemPowerRequest::from_repr(rx.payload[0] as u8) {
            Some(SystemPowerRequest::Reboot | SystemPowerRequest::Reset) => self.system_reset(),
            Some(SystemPowerRequest::Shutdown) => {
                self.system_shutdown();
                Status::Ok
            }
            None => Status::BadPowerState,
        }
    }
}
