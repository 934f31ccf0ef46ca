//! Installing tiling patches across a whole network.
//!
//! Both entry points walk the network with [`conv_layers`] and install a fresh
//! [`PatchedConv`](crate::conv::PatchedConv) on each layer, derived from that
//! layer's own padding geometry. Re-applying overwrites earlier patches, so
//! the final state depends only on the last call.

use serde::{Deserialize, Serialize};

use crate::gate::StepRange;
use crate::padding::AxisModes;
use crate::scan::{conv_layers, LayerTree};

/// Per-axis tiling flags, plus a step range for the stepped variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilingRequest {
    pub tile_x: bool,
    pub tile_y: bool,
    /// `Some` selects the stepped variant, `None` the unconditional one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<StepRange>,
}

impl TilingRequest {
    pub fn stepped(range: StepRange, tile_x: bool, tile_y: bool) -> Self {
        Self {
            tile_x,
            tile_y,
            steps: Some(range),
        }
    }

    pub fn unconditional(tile_x: bool, tile_y: bool) -> Self {
        Self {
            tile_x,
            tile_y,
            steps: None,
        }
    }

    pub fn modes(&self) -> AxisModes {
        AxisModes::from_flags(self.tile_x, self.tile_y)
    }
}

/// Patch every convolution in `network` with step-gated padding.
///
/// Returns the number of layers patched. Counters start at zero.
pub fn apply_stepped<T: LayerTree + ?Sized>(
    network: &mut T,
    range: StepRange,
    tile_x: bool,
    tile_y: bool,
) -> usize {
    if range.is_empty() {
        tracing::warn!(%range, "step range is empty; patched layers will always zero-pad");
    }
    let modes = AxisModes::from_flags(tile_x, tile_y);
    let mut patched = 0;
    for conv in conv_layers(network) {
        conv.install_stepped(modes, range);
        patched += 1;
    }
    tracing::debug!(
        layers = patched,
        %range,
        tile_x,
        tile_y,
        "installed step-gated tiling patch"
    );
    patched
}

/// Patch every convolution in `network` with always-on padding modes.
///
/// Returns the number of layers patched.
pub fn apply_unconditional<T: LayerTree + ?Sized>(
    network: &mut T,
    tile_x: bool,
    tile_y: bool,
) -> usize {
    let modes = AxisModes::from_flags(tile_x, tile_y);
    let mut patched = 0;
    for conv in conv_layers(network) {
        conv.install_unconditional(modes);
        patched += 1;
    }
    tracing::debug!(
        layers = patched,
        tile_x,
        tile_y,
        "installed unconditional tiling patch"
    );
    patched
}

/// Dispatch on whether the request carries a step range.
pub fn apply<T: LayerTree + ?Sized>(network: &mut T, request: &TilingRequest) -> usize {
    match request.steps {
        Some(range) => apply_stepped(network, range, request.tile_x, request.tile_y),
        None => apply_unconditional(network, request.tile_x, request.tile_y),
    }
}
