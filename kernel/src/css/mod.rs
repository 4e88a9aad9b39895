//! Compute subsystem (CSS) power coordination
//!
//! The CSS is a three-level hierarchy: cores inside clusters inside the
//! subsystem. A [`Css`] implementation owns the coordinated state of every
//! level and is the only thing allowed to change it.
//!
//! Two implementations exist:
//!
//! - [`GenericCss`]: a single always-on core that refuses every change
//! - [`Coordinator`]: the real coordination algorithm, parameterised over
//!   platform [`PowerHooks`] that sequence the hardware

mod coordinator;
mod generic;

pub use coordinator::{Coordinator, PowerHooks};
pub use generic::GenericCss;

use scp_common::power::PowerState;
use scp_common::scpi::{CssPowerRequest, Status};

use crate::interrupts::CriticalSection;

/// Coordinated states of the three levels touched by one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatedState {
    pub css: PowerState,
    pub cluster: PowerState,
    pub core: PowerState,
}

/// Power state queries and the single coordination entry point.
pub trait Css {
    fn cluster_count(&self) -> usize;

    /// Number of cores in `cluster`, at most 8. Zero for a cluster that does
    /// not exist.
    fn core_count(&self, cluster: usize) -> usize;

    fn css_state(&self) -> PowerState;

    /// State of `cluster`, [`PowerState::OFF`] if it does not exist.
    fn cluster_state(&self, cluster: usize) -> PowerState;

    /// State of a core, [`PowerState::OFF`] if it does not exist.
    fn core_state(&self, cluster: usize, core: usize) -> PowerState;

    /// Bitmap of the cores of `cluster` that are not off.
    fn online_cores(&self, cluster: usize) -> u8 {
        (0..self.core_count(cluster).min(8))
            .filter(|&core| !self.core_state(cluster, core).is_off())
            .fold(0, |mask, core| mask | 1 << core)
    }

    /// Request new states for one core, its cluster and the subsystem, and
    /// run whatever hardware sequencing the resulting transitions need.
    ///
    /// Requires interrupts to be disabled: the state table has no lock of
    /// its own.
    fn set_power_state(
        &mut self,
        cs: &CriticalSection<'_>,
        request: CssPowerRequest,
    ) -> Result<CoordinatedState, Status>;
}
