//! Cortex-A53 cluster power sequencing
//!
//! One cluster of four cores. Core 0 shares the cluster power domain; the
//! others each have a power switch and output clamps of their own.

use scp_common::power::PowerState;

use crate::css::PowerHooks;
use crate::mmio::{bit, genmask, RegisterBus};
use crate::watchdog::Watchdog;

use super::{CPUCFG_BASE, R_CPUCFG_BASE, R_PRCM_BASE};

const CLUSTER_COUNT: usize = 1;
const CORES_PER_CLUSTER: usize = 4;

// CPUCFG
const C0_CTRL_REG0: usize = CPUCFG_BASE + 0x0000;
const C0_CTRL_REG1: usize = CPUCFG_BASE + 0x0004;
const C0_CTRL_REG2: usize = CPUCFG_BASE + 0x0008;
const C0_CPU_STATUS_REG: usize = CPUCFG_BASE + 0x0030;
const L2_STATUS_REG: usize = CPUCFG_BASE + 0x003c;
const C0_RST_CTRL_REG: usize = CPUCFG_BASE + 0x0080;
const DBG_REG0: usize = CPUCFG_BASE + 0x00c0;

const fn rvba_lo_reg(core: usize) -> usize {
    CPUCFG_BASE + 0x00a0 + 8 * core
}

const CTRL0_AA64NAA32: u32 = genmask(27, 24);
const CTRL0_L2RSTDISABLE: u32 = bit(4);
const CTRL1_ACINACTM: u32 = bit(0);
const CTRL2_L2FLUSHREQ: u32 = bit(8);
const STATUS_STANDBYWFIL2: u32 = bit(0);
const L2_STATUS_L2FLUSHDONE: u32 = bit(10);
/// Cluster, L2 and debug resets plus every core reset, all active-low
const RST_CTRL_ALL: u32 = genmask(28, 24) | genmask(3, 0);

const fn standby_wfi(core: usize) -> u32 {
    bit(16 + core as u32)
}

const fn n_core_reset(core: usize) -> u32 {
    bit(core as u32)
}

const fn dbg_pwr_dup(core: usize) -> u32 {
    bit(core as u32)
}

// R_CPUCFG
const C0_PWRON_RESET_REG: usize = R_CPUCFG_BASE + 0x0030;
const CPU_SYS_RESET_REG: usize = R_CPUCFG_BASE + 0x0140;
const CPU_SYS_RESET: u32 = bit(0);

const fn n_cpu_po_reset(core: usize) -> u32 {
    bit(core as u32)
}

// R_PRCM
const C0_PWROFF_GATING_REG: usize = R_PRCM_BASE + 0x0100;
const C0_PWROFF_GATING: u32 = bit(4);

const fn core_pwroff_gating(core: usize) -> u32 {
    bit(core as u32)
}

const fn power_switch_reg(core: usize) -> usize {
    R_PRCM_BASE + 0x0140 + 4 * core
}

/// Power switch enable steps, limiting inrush current
const POWER_SWITCH_RAMP: [u32; 5] = [0xfe, 0xf8, 0xe0, 0x80, 0x00];
const POWER_SWITCH_STEP_US: u32 = 10;
const POWER_SWITCH_OFF: u32 = 0xff;

pub struct A64Hooks<B> {
    bus: B,
    delay: Watchdog<B>,
    /// Reset vector of core 0, kept while the cluster is powered off
    rvba: u32,
}

impl<B: RegisterBus + Copy> A64Hooks<B> {
    pub fn new(bus: B, delay: Watchdog<B>) -> Self {
        A64Hooks {
            bus,
            delay,
            rvba: 0,
        }
    }

    fn set_power_switch(&self, reg: usize, enable: bool) {
        if !enable {
            self.bus.write32(reg, POWER_SWITCH_OFF);
            return;
        }
        // Already on; ramping again would glitch the rail.
        if self.bus.read32(reg) == 0 {
            return;
        }
        for step in POWER_SWITCH_RAMP {
            self.bus.write32(reg, step);
            self.delay.udelay(POWER_SWITCH_STEP_US);
        }
    }
}

impl<B: RegisterBus + Copy> PowerHooks for A64Hooks<B> {
    fn cluster_count(&self) -> usize {
        CLUSTER_COUNT
    }

    fn core_count(&self, cluster: usize) -> usize {
        if cluster < CLUSTER_COUNT {
            CORES_PER_CLUSTER
        } else {
            0
        }
    }

    fn initial_core_state(&self, _cluster: usize, core: usize) -> PowerState {
        let out_of_reset = self.bus.get32(C0_RST_CTRL_REG, n_core_reset(core));
        let clamped = core > 0 && self.bus.get32(C0_PWROFF_GATING_REG, core_pwroff_gating(core));
        if out_of_reset && !clamped {
            PowerState::ON
        } else {
            PowerState::OFF
        }
    }

    fn raise_css(&mut self, old: PowerState, _new: PowerState) {
        if old.is_off() {
            self.bus.write32(CPU_SYS_RESET_REG, CPU_SYS_RESET);
        }
    }

    fn lower_css(&mut self, _old: PowerState, new: PowerState) {
        if new.is_off() {
            self.bus.write32(CPU_SYS_RESET_REG, 0);
        }
    }

    fn raise_cluster(&mut self, cluster: usize, old: PowerState, _new: PowerState) {
        if !old.is_off() {
            return;
        }
        let bus = self.bus;

        self.set_power_switch(power_switch_reg(0), true);
        bus.clr32(C0_PWROFF_GATING_REG, C0_PWROFF_GATING);
        self.delay.udelay(1);

        bus.write32(DBG_REG0, 0);
        bus.write32(C0_RST_CTRL_REG, 0);
        bus.set32(C0_CTRL_REG0, CTRL0_AA64NAA32);
        bus.clr32(C0_CTRL_REG0, CTRL0_L2RSTDISABLE);
        bus.clr32(C0_CTRL_REG1, CTRL1_ACINACTM);
        bus.write32(C0_RST_CTRL_REG, RST_CTRL_ALL);

        for core in 0..self.core_count(cluster) {
            bus.write32(rvba_lo_reg(core), self.rvba);
        }
    }

    fn lower_cluster(&mut self, _cluster: usize, _old: PowerState, new: PowerState) {
        if !new.is_off() {
            return;
        }
        let bus = self.bus;

        self.rvba = bus.read32(rvba_lo_reg(0));

        bus.set32(C0_CTRL_REG2, CTRL2_L2FLUSHREQ);
        bus.poll32(L2_STATUS_REG, L2_STATUS_L2FLUSHDONE);
        bus.clr32(C0_CTRL_REG2, CTRL2_L2FLUSHREQ);

        bus.set32(C0_CTRL_REG1, CTRL1_ACINACTM);
        bus.poll32(C0_CPU_STATUS_REG, STATUS_STANDBYWFIL2);

        bus.write32(C0_RST_CTRL_REG, 0);
        bus.set32(C0_PWROFF_GATING_REG, C0_PWROFF_GATING);
        self.set_power_switch(power_switch_reg(0), false);
    }

    fn raise_core(&mut self, _cluster: usize, core: usize, old: PowerState, _new: PowerState) {
        if !old.is_off() {
            return;
        }
        let bus = self.bus;

        bus.clr32(C0_RST_CTRL_REG, n_core_reset(core));
        bus.clr32(C0_PWRON_RESET_REG, n_cpu_po_reset(core));
        if core > 0 {
            self.set_power_switch(power_switch_reg(core), true);
            bus.clr32(C0_PWROFF_GATING_REG, core_pwroff_gating(core));
        }
        bus.set32(C0_PWRON_RESET_REG, n_cpu_po_reset(core));
        bus.set32(C0_RST_CTRL_REG, n_core_reset(core));
        bus.set32(DBG_REG0, dbg_pwr_dup(core));
    }

    fn lower_core(&mut self, _cluster: usize, core: usize, _old: PowerState, new: PowerState) {
        if !new.is_off() {
            return;
        }
        let bus = self.bus;

        bus.poll32(C0_CPU_STATUS_REG, standby_wfi(core));
        bus.clr32(DBG_REG0, dbg_pwr_dup(core));
        if core > 0 {
            bus.set32(C0_PWROFF_GATING_REG, core_pwroff_gating(core));
        }
        bus.clr32(C0_RST_CTRL_REG, n_core_reset(core));
        bus.clr32(C0_PWRON_RESET_REG, n_cpu_po_reset(core));
        if core > 0 {
            self.set_power_switch(power_switch_reg(core), false);
        }
    }
}

/// Cores released from reset start in AArch64 state.
pub fn select_aarch64<B: RegisterBus>(bus: &B) {
    bus.set32(C0_CTRL_REG0, CTRL0_AA64NAA32);
}
