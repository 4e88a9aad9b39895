//! Power state ordinals shared by the SCPI wire format and the CSS engine.
//!
//! States are ordered on an "on ... off" axis: a numerically smaller value is
//! more powered-on ("shallower"), a larger value is more powered-off
//! ("deeper"). Coordination is therefore a `min` over children.

use core::fmt;

/// A coordinated power state for a core, a cluster, or the whole CSS.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PowerState(u8);

impl PowerState {
    /// Fully powered and running.
    pub const ON: PowerState = PowerState(0);
    /// Clock-gated, state retained.
    pub const RETENTION: PowerState = PowerState(1);
    /// Power removed.
    pub const OFF: PowerState = PowerState(3);

    /// Largest value representable in a 4-bit descriptor field.
    pub const MAX_RAW: u8 = 0x0f;

    /// Build a state from a raw 4-bit field. Upper bits are discarded.
    pub const fn from_raw(raw: u8) -> Self {
        PowerState(raw & Self::MAX_RAW)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    /// True if this state is at least as deep as [`PowerState::OFF`].
    pub const fn is_off(self) -> bool {
        self.0 >= Self::OFF.0
    }

    /// True if `self` is more powered-on than `other`.
    pub fn is_shallower_than(self, other: PowerState) -> bool {
        self < other
    }

    /// True if `self` is more powered-off than `other`.
    pub fn is_deeper_than(self, other: PowerState) -> bool {
        self > other
    }
}

impl fmt::Debug for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PowerState::ON => write!(f, "On"),
            PowerState::RETENTION => write!(f, "Retention"),
            PowerState::OFF => write!(f, "Off"),
            PowerState(raw) => write!(f, "PowerState({})", raw),
        }
    }
}
