//! Firmware state owner
//!
//! [`Scp`] holds every piece of mutable firmware state: the drivers, the
//! power coordination tables, the lifecycle state, the forwarded-IRQ mask
//! and the mailbox message queue. Every entry point is a method on it.

use crate::config::MESSAGE_QUEUE_DEPTH;
use crate::css::Css;
use crate::intc::Intc;
use crate::interrupts::InterruptIndex;
use crate::ipc::MessageQueue;
use crate::irqf::IrqForwarder;
use crate::mailbox::Msgbox;
use crate::platform::Platform;
use crate::scpi::ScpiMemory;
use crate::system::{SystemState, SystemStateMachine};
use crate::watchdog::Watchdog;

pub struct Scp<P: Platform> {
    pub(crate) platform: P,
    pub(crate) css: P::Css,
    pub(crate) mailbox: Msgbox<P::Bus>,
    pub(crate) intc: Intc<P::Bus>,
    pub(crate) twd: Watchdog<P::Bus>,
    pub(crate) shmem: ScpiMemory<P::Bus>,
    pub(crate) system: SystemStateMachine,
    pub(crate) irqf: IrqForwarder,
    pub(crate) queue: MessageQueue<MESSAGE_QUEUE_DEPTH>,
}

impl<P: Platform> Scp<P> {
    /// Assemble the firmware. No hardware is touched until [`Scp::init`].
    pub fn new(platform: P, css: P::Css) -> Self {
        let bus = platform.bus();
        let devices = P::DEVICES;

        Scp {
            platform,
            css,
            mailbox: Msgbox::new(bus, devices.msgbox),
            intc: Intc::new(bus, devices.r_intc),
            twd: Watchdog::new(bus, devices.r_twd),
            shmem: ScpiMemory::new(bus, devices.scpi_mem),
            system: SystemStateMachine::new(SystemState::Boot),
            irqf: IrqForwarder::new(),
            queue: MessageQueue::new(),
        }
    }

    /// Bring up devices and services in dependency order.
    pub fn init(&mut self) {
        self.twd.init();
        self.intc.init();
        let result = self.platform.init();
        self.check_board("board init", result);
        self.intc.enable(InterruptIndex::Nmi.as_u8());
        self.intc.enable(InterruptIndex::PioPortL.as_u8());
        self.mailbox_init();

        // A rich OS that was already running will have started secondaries.
        let state = self.detect_initial_state();
        self.critical(|scp, cs| scp.system.set(cs, state));

        self.irqf_init();
        self.scpi_init();

        log::info!(
            "Initialization complete: {} cluster(s), {:?}",
            self.css.cluster_count(),
            state
        );
    }

    pub fn system_state(&self) -> SystemState {
        self.system.state()
    }

    pub fn css(&self) -> &P::Css {
        &self.css
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Handle to the trusted watchdog, for the idle loop.
    pub fn watchdog(&self) -> Watchdog<P::Bus> {
        self.twd
    }

    /// An internal invariant broke or a hardware control path failed.
    /// There is no degraded mode: reset everything.
    pub fn fatal(&mut self, reason: &str) -> ! {
        log::error!("Fatal: {}", reason);
        self.system_reset()
    }
}
