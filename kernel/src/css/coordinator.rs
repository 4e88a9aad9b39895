use core::cmp::min;

use scp_common::power::PowerState;
use scp_common::scpi::{CssPowerRequest, Status};

use super::{CoordinatedState, Css};
use crate::config::{MAX_CLUSTERS, MAX_CORES_PER_CLUSTER};
use crate::interrupts::CriticalSection;

/// Platform hardware sequencing for CSS power transitions.
///
/// Hooks run synchronously and are assumed to complete. A raise hook is only
/// called when the new state is shallower than the old one, a lower hook only
/// when it is deeper. Parents are raised before their children and lowered
/// after them.
pub trait PowerHooks {
    fn cluster_count(&self) -> usize;
    fn core_count(&self, cluster: usize) -> usize;

    /// Probe the state a core was left in by the boot ROM or a previous
    /// firmware instance.
    fn initial_core_state(&self, cluster: usize, core: usize) -> PowerState;

    fn raise_css(&mut self, old: PowerState, new: PowerState);
    fn lower_css(&mut self, old: PowerState, new: PowerState);
    fn raise_cluster(&mut self, cluster: usize, old: PowerState, new: PowerState);
    fn lower_cluster(&mut self, cluster: usize, old: PowerState, new: PowerState);
    fn raise_core(&mut self, cluster: usize, core: usize, old: PowerState, new: PowerState);
    fn lower_core(&mut self, cluster: usize, core: usize, old: PowerState, new: PowerState);
}

/// Coordinated state of every level. Entries past the topology are off.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PowerStateTable {
    core: [[PowerState; MAX_CORES_PER_CLUSTER]; MAX_CLUSTERS],
    cluster: [PowerState; MAX_CLUSTERS],
    css: PowerState,
}

impl PowerStateTable {
    const fn all_off() -> Self {
        PowerStateTable {
            core: [[PowerState::OFF; MAX_CORES_PER_CLUSTER]; MAX_CLUSTERS],
            cluster: [PowerState::OFF; MAX_CLUSTERS],
            css: PowerState::OFF,
        }
    }
}

/// Hierarchical power coordination over a set of [`PowerHooks`].
pub struct Coordinator<H> {
    hooks: H,
    clusters: usize,
    cores: [usize; MAX_CLUSTERS],
    table: PowerStateTable,
}

impl<H: PowerHooks> Coordinator<H> {
    /// Build the state table from the hooks' view of the hardware. Cluster
    /// and subsystem states start at the shallowest state of their children.
    pub fn new(hooks: H) -> Self {
        let clusters = hooks.cluster_count().min(MAX_CLUSTERS);
        let mut cores = [0; MAX_CLUSTERS];
        let mut table = PowerStateTable::all_off();

        for cluster in 0..clusters {
            cores[cluster] = hooks.core_count(cluster).min(MAX_CORES_PER_CLUSTER);
            for core in 0..cores[cluster] {
                table.core[cluster][core] = hooks.initial_core_state(cluster, core);
            }
            table.cluster[cluster] = shallowest(&table.core[cluster][..cores[cluster]]);
        }
        table.css = shallowest(&table.cluster[..clusters]);

        Coordinator {
            hooks,
            clusters,
            cores,
            table,
        }
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Target states for `request`, without touching the table.
    fn coordinate(&self, request: &CssPowerRequest) -> Result<CoordinatedState, Status> {
        let cluster = usize::from(request.cluster);
        let core = usize::from(request.core);
        if cluster >= self.clusters || core >= self.cores[cluster] {
            return Err(Status::BadParameter);
        }

        let mut cores = self.table.core[cluster];
        cores[core] = request.core_state;
        let new_cluster = min(
            request.cluster_state,
            shallowest(&cores[..self.cores[cluster]]),
        );

        let mut clusters = self.table.cluster;
        clusters[cluster] = new_cluster;
        let new_css = min(request.css_state, shallowest(&clusters[..self.clusters]));

        Ok(CoordinatedState {
            css: new_css,
            cluster: new_cluster,
            core: request.core_state,
        })
    }
}

impl<H: PowerHooks> Css for Coordinator<H> {
    fn cluster_count(&self) -> usize {
        self.clusters
    }

    fn core_count(&self, cluster: usize) -> usize {
        self.cores.get(cluster).copied().unwrap_or(0)
    }

    fn css_state(&self) -> PowerState {
        self.table.css
    }

    fn cluster_state(&self, cluster: usize) -> PowerState {
        if cluster >= self.clusters {
            return PowerState::OFF;
        }
        self.table.cluster[cluster]
    }

    fn core_state(&self, cluster: usize, core: usize) -> PowerState {
        if core >= self.core_count(cluster) {
            return PowerState::OFF;
        }
        self.table.core[cluster][core]
    }

    fn set_power_state(
        &mut self,
        _cs: &CriticalSection<'_>,
        request: CssPowerRequest,
    ) -> Result<CoordinatedState, Status> {
        let new = self.coordinate(&request)?;
        let cluster = usize::from(request.cluster);
        let core = usize::from(request.core);
        let old = CoordinatedState {
            css: self.table.css,
            cluster: self.table.cluster[cluster],
            core: self.table.core[cluster][core],
        };

        log::debug!(
            "CSS: {}.{} {:?} -> {:?}",
            cluster,
            core,
            old,
            new
        );

        // Bring parents up before their children.
        if new.css.is_shallower_than(old.css) {
            self.hooks.raise_css(old.css, new.css);
        }
        if new.cluster.is_shallower_than(old.cluster) {
            self.hooks.raise_cluster(cluster, old.cluster, new.cluster);
        }
        if new.core.is_shallower_than(old.core) {
            self.hooks.raise_core(cluster, core, old.core, new.core);
        }

        // Take children down before their parents.
        if new.core.is_deeper_than(old.core) {
            self.hooks.lower_core(cluster, core, old.core, new.core);
        }
        if new.cluster.is_deeper_than(old.cluster) {
            self.hooks.lower_cluster(cluster, old.cluster, new.cluster);
        }
        if new.css.is_deeper_than(old.css) {
            self.hooks.lower_css(old.css, new.css);
        }

        self.table.core[cluster][core] = new.core;
        self.table.cluster[cluster] = new.cluster;
        self.table.css = new.css;

        Ok(new)
    }
}

/// The most powered-on state in `states`, or off if there are none.
fn shallowest(states: &[PowerState]) -> PowerState {
    states.iter().copied().min().unwrap_or(PowerState::OFF)
}
