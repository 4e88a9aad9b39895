//! System lifecycle state machine
//!
//! ```text
//! Boot -> Runtime <-> Suspend -> Off
//!   ^                             |
//!   +---------- (reset) ----------+
//! ```
//!
//! The state decides whether the SCP announces itself at startup and whether
//! interrupts are forwarded to the rich OS. Transitions are marked inside a
//! critical section; the slow device work that follows runs with interrupts
//! enabled again.

use scp_common::power::PowerState;
use scp_common::scpi::CssPowerRequest;
use scp_common::ScpError;

use crate::css::Css;
use crate::firmware::Scp;
use crate::interrupts::CriticalSection;
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Trusted firmware has not yet acknowledged the SCP
    Boot,
    Runtime,
    Suspend,
    /// Powered off as far as the rest of the system can tell, but this
    /// firmware kept running
    Off,
}

impl SystemState {
    /// Lifecycle state to start in, from the online cores of cluster 0.
    ///
    /// Only the boot core is running on a cold boot. Anything else means the
    /// rich OS was already up when this firmware (re)started.
    pub fn detect(online_cores: u8) -> Self {
        if online_cores == 0b1 {
            SystemState::Boot
        } else {
            SystemState::Runtime
        }
    }
}

/// Owner of the lifecycle state. Mutation requires a critical section.
#[derive(Debug)]
pub struct SystemStateMachine {
    state: SystemState,
}

impl SystemStateMachine {
    pub const fn new(state: SystemState) -> Self {
        SystemStateMachine { state }
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    pub fn set(&mut self, _cs: &CriticalSection<'_>, state: SystemState) {
        self.state = state;
    }

    #[cfg(test)]
    pub fn force(&mut self, state: SystemState) {
        self.state = state;
    }
}

impl<P: Platform> Scp<P> {
    /// Trusted firmware acknowledged the ready announcement.
    pub fn system_boot_complete(&mut self) {
        let booted = self.critical(|scp, cs| {
            if scp.system.state() != SystemState::Boot {
                return false;
            }
            scp.system.set(cs, SystemState::Runtime);
            true
        });

        if !booted {
            self.fatal("boot complete outside of boot");
        }
        log::info!("System: boot complete");
    }

    /// Enter system suspend. Does nothing if already suspended.
    pub fn system_suspend(&mut self) {
        let entered = self.critical(|scp, cs| {
            if scp.system.state() == SystemState::Suspend {
                return false;
            }
            scp.system.set(cs, SystemState::Suspend);
            true
        });
        if !entered {
            return;
        }

        log::info!("System: suspend");
        self.platform.enable_wakeup();
        let result = self.platform.pmic_suspend();
        self.check_board("PMIC suspend", result);
    }

    /// Leave system suspend and bring the boot core back up.
    ///
    /// Resuming from the off state resets the whole system. Any state other
    /// than suspend is left alone.
    pub fn system_resume(&mut self) {
        let resumed = self.critical(|scp, cs| match scp.system.state() {
            SystemState::Off => scp.system_reset(),
            SystemState::Suspend => {
                scp.system.set(cs, SystemState::Runtime);
                true
            }
            _ => false,
        });
        if !resumed {
            return;
        }

        log::info!("System: resume");
        let result = self.platform.pmic_resume();
        self.check_board("PMIC resume", result);
        self.platform.disable_wakeup();

        let request = CssPowerRequest {
            core: 0,
            cluster: 0,
            core_state: PowerState::ON,
            cluster_state: PowerState::ON,
            css_state: PowerState::ON,
        };
        if let Err(status) = self.critical(|scp, cs| scp.css.set_power_state(cs, request)) {
            log::warn!("System: failed to power on boot core: {}", status);
        }
    }

    /// Power the system off. Does nothing if already off.
    pub fn system_shutdown(&mut self) {
        let entered = self.critical(|scp, cs| {
            if scp.system.state() == SystemState::Off {
                return false;
            }
            scp.system.set(cs, SystemState::Suspend);
            true
        });
        if !entered {
            return;
        }

        log::info!("System: shutdown");
        let result = self.platform.pmic_shutdown();
        self.check_board("PMIC shutdown", result);

        // Still running, so the PMIC did not take power from the SCP.
        self.critical(|scp, cs| scp.system.set(cs, SystemState::Off));
    }

    /// Reset the whole system. Tries the PMIC, then the trusted watchdog,
    /// then restarts this firmware.
    pub fn system_reset(&mut self) -> ! {
        log::info!("System: reset");
        if let Err(err) = self.platform.pmic_reset() {
            log::warn!("System: PMIC reset failed: {:?}", err);
        }

        self.twd.set_interval(1);
        self.twd.restart();
        self.twd.udelay(1);

        self.platform.restart()
    }

    /// Lifecycle state implied by the cores already running.
    pub fn detect_initial_state(&self) -> SystemState {
        SystemState::detect(self.css.online_cores(0))
    }

    /// A board operation that is not implemented is tolerated; a failing
    /// sideband bus is not.
    pub(crate) fn check_board(&mut self, what: &str, result: Result<(), ScpError>) {
        match result {
            Ok(()) => {}
            Err(ScpError::Unsupported) => log::debug!("System: {} not supported", what),
            Err(err) => {
                log::error!("System: {} failed: {:?}", what, err);
                self.fatal(what);
            }
        }
    }
}
