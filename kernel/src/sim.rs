//! Simulated hardware for host tests
//!
//! [`SimBus`] is a register file with just enough behaviour to drive the
//! firmware: message box FIFOs, write-one-to-clear status registers, the
//! interrupt controller's vector register and a counter that advances on
//! every read. Every write and fence is logged so tests can check ordering.
//!
//! [`SimPlatform`] records board calls and turns a firmware restart into a
//! panic with the message `"firmware restart"`.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;

use scp_common::power::PowerState;
use scp_common::scpi::{Client, Message, MessageHeader, PAYLOAD_WORDS};
use scp_common::ScpError;

use crate::css::{Coordinator, Css, PowerHooks};
use crate::firmware::Scp;
use crate::interrupts::{InterruptControl, IrqFlags};
use crate::mmio::RegisterBus;
use crate::platform::{Board, Clock, DeviceMap, IrqOutcome, Platform};
use crate::scpi::ScpiMemory;
use crate::system::SystemState;

pub const SIM_DEVICES: DeviceMap = DeviceMap {
    msgbox: 0x01c1_7000,
    r_intc: 0x01f0_0c00,
    r_twd: 0x01f0_1800,
    scpi_mem: 0x0001_3c00,
};

const MSGBOX_IRQ_STAT: usize = 0x50;
const MSGBOX_ARM_IRQ_STAT: usize = 0x70;
const INTC_VECTOR: usize = 0x00;
const INTC_PEND: usize = 0x10;
const INTC_MASK: usize = 0x50;
const TWD_LOW_CNT: usize = 0x20;
const TWD_INTERVAL: usize = 0x30;

const CHANNELS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    Write(usize, u32),
    Release,
    Acquire,
}

/// Decoded message box register.
enum MsgboxReg {
    IrqStat,
    ArmIrqStat,
    FifoStat(usize),
    MsgStat(usize),
    MsgData(usize),
}

#[derive(Default)]
pub struct SimBus {
    regs: RefCell<HashMap<usize, u32>>,
    counter: Cell<u32>,
    fifos: RefCell<[VecDeque<u32>; CHANNELS]>,
    sent: RefCell<[Vec<u32>; CHANNELS]>,
    msgbox_irq_stat: Cell<u32>,
    intc_pending: Cell<u32>,
    auto_clear: RefCell<HashMap<usize, u32>>,
    events: RefCell<Vec<BusEvent>>,
}

impl SimBus {
    /// Counter ticks per counter read.
    pub const COUNTER_STEP: u32 = 1000;
    /// Words each message box FIFO holds.
    pub const FIFO_DEPTH: usize = 8;

    pub fn new() -> Self {
        Self::default()
    }

    fn msgbox_reg(addr: usize) -> Option<MsgboxReg> {
        let offset = addr.checked_sub(SIM_DEVICES.msgbox)?;
        let chan = (offset & 0x3f) / 4;
        match offset {
            MSGBOX_IRQ_STAT => Some(MsgboxReg::IrqStat),
            MSGBOX_ARM_IRQ_STAT => Some(MsgboxReg::ArmIrqStat),
            0x100..=0x11c => Some(MsgboxReg::FifoStat(chan)),
            0x140..=0x15c => Some(MsgboxReg::MsgStat(chan)),
            0x180..=0x19c => Some(MsgboxReg::MsgData(chan)),
            _ => None,
        }
    }

    /// Register contents as the firmware would see them, without side effects.
    pub fn peek(&self, addr: usize) -> u32 {
        if let Some(reg) = Self::msgbox_reg(addr) {
            let fifos = self.fifos.borrow();
            return match reg {
                MsgboxReg::IrqStat => self.msgbox_irq_stat.get(),
                MsgboxReg::ArmIrqStat => (0..CHANNELS)
                    .filter(|&n| n % 2 == 1 && !fifos[n].is_empty())
                    .fold(0, |stat, n| stat | 1 << (2 * n)),
                MsgboxReg::FifoStat(n) => (fifos[n].len() >= Self::FIFO_DEPTH) as u32,
                MsgboxReg::MsgStat(n) => fifos[n].len() as u32,
                MsgboxReg::MsgData(n) => fifos[n].front().copied().unwrap_or(0),
            };
        }

        if addr == SIM_DEVICES.r_intc + INTC_VECTOR {
            let pending = self.intc_pending.get();
            return if pending == 0 { 0 } else { pending.trailing_zeros() << 2 };
        }
        if addr == SIM_DEVICES.r_intc + INTC_PEND {
            return self.intc_pending.get();
        }
        if addr == SIM_DEVICES.r_twd + TWD_LOW_CNT {
            return self.counter.get();
        }

        self.regs.borrow().get(&addr).copied().unwrap_or(0)
    }

    /// Store a value with no side effects and no event.
    pub fn poke(&self, addr: usize, value: u32) {
        self.regs.borrow_mut().insert(addr, value);
    }

    /// Bits of `addr` the hardware clears as soon as they are written.
    pub fn set_auto_clear(&self, addr: usize, mask: u32) {
        self.auto_clear.borrow_mut().insert(addr, mask);
    }

    pub fn set_counter(&self, value: u32) {
        self.counter.set(value);
    }

    pub fn watchdog_interval(&self) -> u32 {
        self.peek(SIM_DEVICES.r_twd + TWD_INTERVAL)
    }

    // Interrupt controller

    pub fn raise_irq(&self, irq: u8) {
        self.intc_pending.set(self.intc_pending.get() | 1 << irq);
    }

    /// The line was serviced elsewhere before the SCP looked at it.
    pub fn clear_irq(&self, irq: u8) {
        self.intc_pending.set(self.intc_pending.get() & !(1 << irq));
    }

    pub fn intc_pending(&self, irq: u8) -> bool {
        self.intc_pending.get() & 1 << irq != 0
    }

    pub fn intc_masked(&self, irq: u8) -> bool {
        self.peek(SIM_DEVICES.r_intc + INTC_MASK) & 1 << irq != 0
    }

    // Message box, seen from the application processor side

    /// Push a word into a receive channel and raise its status bit.
    pub fn deliver(&self, chan: u8, word: u32) {
        let chan = usize::from(chan);
        self.fifos.borrow_mut()[chan].push_back(word);
        self.msgbox_irq_stat
            .set(self.msgbox_irq_stat.get() | 1 << (2 * chan));
    }

    /// Every word the SCP has sent on `chan`.
    pub fn mailbox_sent(&self, chan: u8) -> Vec<u32> {
        self.sent.borrow()[usize::from(chan)].clone()
    }

    /// Consume the oldest word the SCP sent on `chan`.
    pub fn peer_read(&self, chan: u8) -> Option<u32> {
        self.fifos.borrow_mut()[usize::from(chan)].pop_front()
    }

    // SCPI shared memory

    fn shmem(&self) -> ScpiMemory<&SimBus> {
        ScpiMemory::new(self, SIM_DEVICES.scpi_mem)
    }

    pub fn write_request(&self, client: Client, command: u8, sender: u8, payload: &[u32]) {
        self.write_request_sized(client, command, sender, payload, (payload.len() * 4) as u16);
    }

    pub fn write_request_sized(
        &self,
        client: Client,
        command: u8,
        sender: u8,
        payload: &[u32],
        size: u16,
    ) {
        let slot = self.shmem().rx_slot(client);
        let header = MessageHeader {
            command,
            sender,
            size,
            status: 0,
        }
        .encode();
        self.poke(slot, header[0]);
        self.poke(slot + 4, header[1]);
        for (i, &word) in payload.iter().enumerate() {
            self.poke(slot + 8 + 4 * i, word);
        }
    }

    /// The message currently in a client's transmit slot.
    pub fn read_reply(&self, client: Client) -> Message {
        let slot = self.shmem().tx_slot(client);
        let mut msg = Message::new();
        msg.header = MessageHeader::decode([self.peek(slot), self.peek(slot + 4)]);
        for i in 0..PAYLOAD_WORDS {
            msg.payload[i] = self.peek(slot + 8 + 4 * i);
        }
        msg
    }

    // Event log

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    /// Values written to `addr`, in order.
    pub fn writes_to(&self, addr: usize) -> Vec<u32> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match *event {
                BusEvent::Write(a, value) if a == addr => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn event_index_of_write(&self, addr: usize) -> Option<usize> {
        self.events
            .borrow()
            .iter()
            .position(|event| matches!(*event, BusEvent::Write(a, _) if a == addr))
    }

    pub fn event_index_of_release(&self) -> Option<usize> {
        self.events
            .borrow()
            .iter()
            .position(|event| *event == BusEvent::Release)
    }

    pub fn event_index_of_send(&self, chan: u8) -> Option<usize> {
        self.event_index_of_write(SIM_DEVICES.msgbox + 0x180 + 4 * usize::from(chan))
    }
}

impl RegisterBus for SimBus {
    fn read32(&self, addr: usize) -> u32 {
        if addr == SIM_DEVICES.r_twd + TWD_LOW_CNT {
            self.counter
                .set(self.counter.get().wrapping_add(Self::COUNTER_STEP));
        }
        let value = self.peek(addr);
        if let Some(MsgboxReg::MsgData(n)) = Self::msgbox_reg(addr) {
            self.fifos.borrow_mut()[n].pop_front();
        }
        value
    }

    fn write32(&self, addr: usize, value: u32) {
        self.events.borrow_mut().push(BusEvent::Write(addr, value));

        match Self::msgbox_reg(addr) {
            Some(MsgboxReg::IrqStat) => {
                self.msgbox_irq_stat
                    .set(self.msgbox_irq_stat.get() & !value);
                return;
            }
            Some(MsgboxReg::MsgData(n)) => {
                let mut fifos = self.fifos.borrow_mut();
                if fifos[n].len() < Self::FIFO_DEPTH {
                    fifos[n].push_back(value);
                    self.sent.borrow_mut()[n].push(value);
                }
                return;
            }
            _ => {}
        }

        if addr == SIM_DEVICES.r_intc + INTC_PEND {
            self.intc_pending.set(self.intc_pending.get() & !value);
            return;
        }
        if addr == SIM_DEVICES.r_twd + TWD_LOW_CNT {
            self.counter.set(value);
            return;
        }

        let clear = self.auto_clear.borrow().get(&addr).copied().unwrap_or(0);
        self.regs.borrow_mut().insert(addr, value & !clear);
    }

    fn fence_release(&self) {
        self.events.borrow_mut().push(BusEvent::Release);
    }

    fn fence_acquire(&self) {
        self.events.borrow_mut().push(BusEvent::Acquire);
    }
}

/// A board call observed by [`SimPlatform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    EnableClock(Clock),
    PmicSuspend,
    PmicResume,
    PmicShutdown,
    PmicReset,
    EnableWakeup,
    DisableWakeup,
}

pub struct SimPlatform<'a, C = Coordinator<RecordingHooks>> {
    bus: &'a SimBus,
    irq_enabled: Cell<bool>,
    events: Vec<BoardEvent>,
    /// Interrupt-enable flag at each PMIC and wakeup call
    irq_at_calls: Vec<bool>,
    pub initialized: Cell<bool>,
    pub pmic_result: Cell<Result<(), ScpError>>,
    pub pmic_outcome: Cell<IrqOutcome>,
    pub wakeup_outcome: Cell<IrqOutcome>,
    _css: PhantomData<C>,
}

impl<'a, C> SimPlatform<'a, C> {
    pub fn new(bus: &'a SimBus) -> Self {
        SimPlatform {
            bus,
            irq_enabled: Cell::new(true),
            events: Vec::new(),
            irq_at_calls: Vec::new(),
            initialized: Cell::new(false),
            pmic_result: Cell::new(Ok(())),
            pmic_outcome: Cell::new(IrqOutcome::NotMine),
            wakeup_outcome: Cell::new(IrqOutcome::NotMine),
            _css: PhantomData,
        }
    }

    pub fn events(&self) -> Vec<BoardEvent> {
        self.events
            .iter()
            .copied()
            .filter(|event| !matches!(event, BoardEvent::EnableClock(_)))
            .collect()
    }

    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled.get()
    }

    pub fn irq_enabled_at_calls(&self) -> &[bool] {
        &self.irq_at_calls
    }

    fn push(&mut self, event: BoardEvent) {
        self.events.push(event);
        self.irq_at_calls.push(self.irq_enabled.get());
    }

    fn record(&mut self, event: BoardEvent) -> Result<(), ScpError> {
        self.push(event);
        self.pmic_result.get()
    }
}

impl<'a> SimPlatform<'a> {
    /// Firmware on a single cluster of four cores with only core 0 running.
    pub fn firmware(bus: &'a SimBus) -> Scp<SimPlatform<'a>> {
        Self::firmware_with(bus, &[0b0001])
    }

    /// Firmware on one four-core cluster per entry of `online`, each entry
    /// the bitmap of cores initially running.
    pub fn firmware_with(bus: &'a SimBus, online: &[u8]) -> Scp<SimPlatform<'a>> {
        let css = Coordinator::new(RecordingHooks::with_online(online, 4));
        Scp::new(SimPlatform::new(bus), css)
    }
}

impl<C> InterruptControl for SimPlatform<'_, C> {
    fn disable_interrupts(&self) -> IrqFlags {
        IrqFlags(self.irq_enabled.replace(false) as u32)
    }

    fn restore_interrupts(&self, flags: IrqFlags) {
        self.irq_enabled.set(flags.0 != 0);
    }
}

impl<C> Board for SimPlatform<'_, C> {
    fn init(&mut self) -> Result<(), ScpError> {
        self.initialized.set(true);
        self.pmic_result.get()
    }

    fn enable_clock(&mut self, clock: Clock) {
        self.events.push(BoardEvent::EnableClock(clock));
    }

    fn pmic_suspend(&mut self) -> Result<(), ScpError> {
        self.record(BoardEvent::PmicSuspend)
    }

    fn pmic_resume(&mut self) -> Result<(), ScpError> {
        self.record(BoardEvent::PmicResume)
    }

    fn pmic_shutdown(&mut self) -> Result<(), ScpError> {
        self.record(BoardEvent::PmicShutdown)
    }

    fn pmic_reset(&mut self) -> Result<(), ScpError> {
        self.record(BoardEvent::PmicReset)
    }

    fn enable_wakeup(&mut self) {
        self.push(BoardEvent::EnableWakeup);
    }

    fn disable_wakeup(&mut self) {
        self.push(BoardEvent::DisableWakeup);
    }

    fn pmic_irq(&mut self, _state: SystemState) -> Result<IrqOutcome, ScpError> {
        self.pmic_result.get().map(|()| self.pmic_outcome.get())
    }

    fn wakeup_irq(&mut self, _state: SystemState) -> IrqOutcome {
        self.wakeup_outcome.get()
    }
}

impl<'a, C: Css> Platform for SimPlatform<'a, C> {
    type Bus = &'a SimBus;
    type Css = C;

    const DEVICES: DeviceMap = SIM_DEVICES;

    fn bus(&self) -> &'a SimBus {
        self.bus
    }

    fn restart(&mut self) -> ! {
        panic!("firmware restart");
    }
}

/// A power hook invocation: cluster and core indices, then old and new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookCall {
    RaiseCss(PowerState, PowerState),
    LowerCss(PowerState, PowerState),
    RaiseCluster(usize, PowerState, PowerState),
    LowerCluster(usize, PowerState, PowerState),
    RaiseCore(usize, usize, PowerState, PowerState),
    LowerCore(usize, usize, PowerState, PowerState),
}

/// Power hooks that only record what they were asked to do.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    online: Vec<u8>,
    cores: usize,
    pub calls: Vec<HookCall>,
}

impl RecordingHooks {
    pub fn with_online(online: &[u8], cores: usize) -> Self {
        RecordingHooks {
            online: online.to_vec(),
            cores,
            calls: Vec::new(),
        }
    }
}

impl PowerHooks for RecordingHooks {
    fn cluster_count(&self) -> usize {
        self.online.len()
    }

    fn core_count(&self, cluster: usize) -> usize {
        if cluster < self.online.len() {
            self.cores
        } else {
            0
        }
    }

    fn initial_core_state(&self, cluster: usize, core: usize) -> PowerState {
        if self.online[cluster] & 1 << core != 0 {
            PowerState::ON
        } else {
            PowerState::OFF
        }
    }

    fn raise_css(&mut self, old: PowerState, new: PowerState) {
        self.calls.push(HookCall::RaiseCss(old, new));
    }

    fn lower_css(&mut self, old: PowerState, new: PowerState) {
        self.calls.push(HookCall::LowerCss(old, new));
    }

    fn raise_cluster(&mut self, cluster: usize, old: PowerState, new: PowerState) {
        self.calls.push(HookCall::RaiseCluster(cluster, old, new));
    }

    fn lower_cluster(&mut self, cluster: usize, old: PowerState, new: PowerState) {
        self.calls.push(HookCall::LowerCluster(cluster, old, new));
    }

    fn raise_core(&mut self, cluster: usize, core: usize, old: PowerState, new: PowerState) {
        self.calls.push(HookCall::RaiseCore(cluster, core, old, new));
    }

    fn lower_core(&mut self, cluster: usize, core: usize, old: PowerState, new: PowerState) {
        self.calls.push(HookCall::LowerCore(cluster, core, old, new));
    }
}
