//! Host-facing operations.
//!
//! The node-graph runtime drives two operations: [`SeamlessTilingPatch`],
//! which patches a denoising network for a range of sampling steps, and
//! [`CircularDecode`], which patches a decoder and decodes latents with it.

use std::fmt;
use std::str::FromStr;

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TilingError};
use crate::gate::StepRange;
use crate::patch::{apply_stepped, apply_unconditional};
use crate::scan::LayerTree;

/// A latent decoder whose convolutions are reachable through [`LayerTree`].
pub trait LatentDecoder: LayerTree {
    fn decode(&self, samples: &Tensor) -> candle_core::Result<Tensor>;
}

/// Which axes the decoder should tile on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TilingMode {
    #[default]
    Enable,
    XOnly,
    YOnly,
    Disable,
}

impl TilingMode {
    pub const ALL: [TilingMode; 4] = [Self::Enable, Self::XOnly, Self::YOnly, Self::Disable];

    /// `(tile_x, tile_y)`
    pub fn axis_flags(self) -> (bool, bool) {
        match self {
            Self::Enable => (true, true),
            Self::XOnly => (true, false),
            Self::YOnly => (false, true),
            Self::Disable => (false, false),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::XOnly => "x_only",
            Self::YOnly => "y_only",
            Self::Disable => "disable",
        }
    }
}

impl fmt::Display for TilingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TilingMode {
    type Err = TilingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| TilingError::UnknownTilingMode(s.to_string()))
    }
}

/// Step-gated seamless tiling for a denoising network.
///
/// Negative step bounds mean "unbounded" on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeamlessTilingPatch {
    pub start_step: i64,
    pub stop_step: i64,
    pub tiling_x: bool,
    pub tiling_y: bool,
}

impl Default for SeamlessTilingPatch {
    fn default() -> Self {
        Self {
            start_step: 0,
            stop_step: 999,
            tiling_x: true,
            tiling_y: true,
        }
    }
}

impl SeamlessTilingPatch {
    pub fn step_range(&self) -> StepRange {
        StepRange::from_host(self.start_step, self.stop_step)
    }

    /// Patch `model` in place and hand the same instance back.
    pub fn apply<M: LayerTree>(&self, mut model: M) -> M {
        let layers = apply_stepped(&mut model, self.step_range(), self.tiling_x, self.tiling_y);
        tracing::info!(
            layers,
            range = %self.step_range(),
            tiling_x = self.tiling_x,
            tiling_y = self.tiling_y,
            "seamless tiling patch applied"
        );
        model
    }
}

/// Decode with circular padding on the selected axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CircularDecode {
    pub tiling: TilingMode,
}

impl CircularDecode {
    pub fn new(tiling: TilingMode) -> Self {
        Self { tiling }
    }

    /// Patch `decoder` and decode `samples`.
    ///
    /// The patch stays installed on the decoder afterwards.
    pub fn decode<D: LatentDecoder + ?Sized>(
        &self,
        samples: &Tensor,
        decoder: &mut D,
    ) -> Result<Tensor> {
        let (tile_x, tile_y) = self.tiling.axis_flags();
        let layers = apply_unconditional(&mut *decoder, tile_x, tile_y);
        tracing::debug!(layers, tiling = %self.tiling, "decoding with circular padding");
        Ok(decoder.decode(samples)?)
    }
}

/// The operations exported to the node-graph host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    SeamlessTilingPatch,
    CircularDecode,
}

impl NodeKind {
    pub const ALL: [NodeKind; 2] = [Self::SeamlessTilingPatch, Self::CircularDecode];

    pub fn class_name(self) -> &'static str {
        match self {
            Self::SeamlessTilingPatch => "SeamlessTilingPatch",
            Self::CircularDecode => "CircularDecode",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::SeamlessTilingPatch => "Seamless Tiling Patch",
            Self::CircularDecode => "Circular VAE Decode",
        }
    }

    pub fn from_class_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.class_name() == name)
    }
}
