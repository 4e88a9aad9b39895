use scp_common::power::PowerState;
use scp_common::scpi::{CssPowerRequest, Status};

use super::{CoordinatedState, Css};
use crate::interrupts::CriticalSection;

/// Fallback for platforms without CSS power control.
///
/// Describes one cluster with one core, always on. Since nothing can be
/// turned off, every request that would change a state is refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericCss;

impl Css for GenericCss {
    fn cluster_count(&self) -> usize {
        1
    }

    fn core_count(&self, cluster: usize) -> usize {
        if cluster < self.cluster_count() {
            1
        } else {
            0
        }
    }

    fn css_state(&self) -> PowerState {
        PowerState::ON
    }

    fn cluster_state(&self, cluster: usize) -> PowerState {
        if cluster < self.cluster_count() {
            PowerState::ON
        } else {
            PowerState::OFF
        }
    }

    fn core_state(&self, cluster: usize, core: usize) -> PowerState {
        if core < self.core_count(cluster) {
            PowerState::ON
        } else {
            PowerState::OFF
        }
    }

    fn set_power_state(
        &mut self,
        _cs: &CriticalSection<'_>,
        request: CssPowerRequest,
    ) -> Result<CoordinatedState, Status> {
        let cluster = usize::from(request.cluster);
        let core = usize::from(request.core);
        if core >= self.core_count(cluster) {
            return Err(Status::BadParameter);
        }

        // With the only core on, the cluster and subsystem coordinate to on
        // whatever was requested for them.
        if request.core_state != self.core_state(cluster, core) {
            return Err(Status::NotSupported);
        }

        Ok(CoordinatedState {
            css: PowerState::ON,
            cluster: PowerState::ON,
            core: PowerState::ON,
        })
    }
}
