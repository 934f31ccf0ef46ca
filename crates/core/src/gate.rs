//! Step gating for patched layers.
//!
//! Every patched layer counts its own invocations. On each call the gate
//! checks the pre-increment count against an inclusive [`StepRange`], then
//! advances by one whether or not the call was in range. The counter
//! therefore tracks forward passes through the layer, not active passes.

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive range of steps during which the patched padding is active.
///
/// `None` on either side means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StepRange {
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub stop: Option<u64>,
}

impl StepRange {
    pub const UNBOUNDED: Self = Self {
        start: None,
        stop: None,
    };

    pub fn new(start: Option<u64>, stop: Option<u64>) -> Self {
        Self { start, stop }
    }

    pub fn bounded(start: u64, stop: u64) -> Self {
        Self::new(Some(start), Some(stop))
    }

    /// Build a range from host-side integers, where any negative value means
    /// "no bound on this side".
    pub fn from_host(start: i64, stop: i64) -> Self {
        Self {
            start: u64::try_from(start).ok(),
            stop: u64::try_from(stop).ok(),
        }
    }

    /// Host-side encoding of the range, `-1` standing for an absent bound.
    pub fn to_host(&self) -> (i64, i64) {
        let encode = |bound: Option<u64>| {
            bound
                .map(|b| i64::try_from(b).unwrap_or(i64::MAX))
                .unwrap_or(-1)
        };
        (encode(self.start), encode(self.stop))
    }

    pub fn contains(&self, step: u64) -> bool {
        self.start.map_or(true, |start| step >= start) && self.stop.map_or(true, |stop| step <= stop)
    }

    /// True when both bounds are set and no step can satisfy them.
    pub fn is_empty(&self) -> bool {
        matches!((self.start, self.stop), (Some(start), Some(stop)) if start > stop)
    }
}

impl fmt::Display for StepRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => write!(f, "[{start}, {stop}]"),
            (Some(start), None) => write!(f, "[{start}, ..)"),
            (None, Some(stop)) => write!(f, "(.., {stop}]"),
            (None, None) => f.write_str("(..)"),
        }
    }
}

/// Per-layer invocation counter paired with its configured range.
///
/// The counter lives in a [`Cell`], so a gate (and any layer holding one) is
/// `!Sync`: a patched layer must not be driven from several threads at once.
#[derive(Debug, Clone)]
pub struct StepGate {
    range: StepRange,
    counter: Cell<u64>,
}

impl StepGate {
    pub fn new(range: StepRange) -> Self {
        Self {
            range,
            counter: Cell::new(0),
        }
    }

    #[cfg(test)]
    fn starting_at(range: StepRange, counter: u64) -> Self {
        Self {
            range,
            counter: Cell::new(counter),
        }
    }

    pub fn range(&self) -> StepRange {
        self.range
    }

    /// Number of invocations so far.
    pub fn counter(&self) -> u64 {
        self.counter.get()
    }

    /// Whether the next invocation will be active. Does not advance.
    pub fn is_active(&self) -> bool {
        self.range.contains(self.counter.get())
    }

    /// Decide for the current step, then advance the counter by one.
    pub fn advance(&self) -> bool {
        let step = self.counter.get();
        let active = self.range.contains(step);
        self.counter.set(step.saturating_add(1));
        tracing::trace!(step, active, range = %self.range, "step gate");
        active
    }
}
