//! Per-axis padding geometry and the explicit padding primitive.
//!
//! A convolution layer carries one symmetric pad width per spatial axis.
//! Patching never changes those amounts, only how the pad region is filled:
//! zeros (`Constant`) or values wrapped from the opposite edge (`Circular`).
//!
//! Tensors are laid out `[..., height, width]`: the horizontal axis is the
//! last dimension and the vertical axis the one before it.

use std::fmt;

use candle_core::{Result, Tensor};
use serde::{Deserialize, Serialize};

/// Border-extension mode for one spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisMode {
    /// Wrap values from the opposite edge.
    Circular,
    /// Zero-fill.
    #[default]
    Constant,
}

impl AxisMode {
    /// `Circular` when tiling is requested on the axis, `Constant` otherwise.
    pub fn from_tiling(enabled: bool) -> Self {
        if enabled {
            Self::Circular
        } else {
            Self::Constant
        }
    }

    pub fn is_circular(self) -> bool {
        matches!(self, Self::Circular)
    }
}

impl fmt::Display for AxisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Circular => f.write_str("circular"),
            Self::Constant => f.write_str("constant"),
        }
    }
}

/// Independent modes for the horizontal (`x`) and vertical (`y`) axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AxisModes {
    pub x: AxisMode,
    pub y: AxisMode,
}

impl AxisModes {
    /// Zero padding on both axes: the behaviour of an unpatched layer.
    pub const CONSTANT: Self = Self {
        x: AxisMode::Constant,
        y: AxisMode::Constant,
    };

    pub const CIRCULAR: Self = Self {
        x: AxisMode::Circular,
        y: AxisMode::Circular,
    };

    pub fn new(x: AxisMode, y: AxisMode) -> Self {
        Self { x, y }
    }

    pub fn from_flags(tile_x: bool, tile_y: bool) -> Self {
        Self {
            x: AxisMode::from_tiling(tile_x),
            y: AxisMode::from_tiling(tile_y),
        }
    }
}

/// The symmetric pad widths a convolution layer applies natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativePadding {
    /// Rows added above and below.
    pub height: usize,
    /// Columns added left and right.
    pub width: usize,
}

impl NativePadding {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    pub fn symmetric(padding: usize) -> Self {
        Self::new(padding, padding)
    }

    pub fn is_uniform(&self) -> bool {
        self.height == self.width
    }
}

/// Explicit before/after pad amounts for both spatial axes.
///
/// `left + right` and `top + bottom` always equal the layer's native total,
/// so patching never changes the output spatial size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PaddingSpec {
    pub left: usize,
    pub right: usize,
    pub top: usize,
    pub bottom: usize,
}

impl PaddingSpec {
    /// Split each native width into an explicit before/after pair.
    pub fn derive(native: NativePadding) -> Self {
        Self {
            left: native.width,
            right: native.width,
            top: native.height,
            bottom: native.height,
        }
    }

    pub fn horizontal(&self) -> (usize, usize) {
        (self.left, self.right)
    }

    pub fn vertical(&self) -> (usize, usize) {
        (self.top, self.bottom)
    }

    pub fn total_width(&self) -> usize {
        self.left + self.right
    }

    pub fn total_height(&self) -> usize {
        self.top + self.bottom
    }
}

impl From<NativePadding> for PaddingSpec {
    fn from(native: NativePadding) -> Self {
        Self::derive(native)
    }
}

/// Pad `x` along `dim` by `before`/`after` elements using `mode`.
///
/// Circular padding fails when either amount exceeds the extent of `dim`.
pub fn pad_axis(
    x: &Tensor,
    dim: usize,
    before: usize,
    after: usize,
    mode: AxisMode,
) -> Result<Tensor> {
    if before == 0 && after == 0 {
        return Ok(x.clone());
    }
    match mode {
        AxisMode::Constant => x.pad_with_zeros(dim, before, after),
        AxisMode::Circular => pad_circular(x, dim, before, after),
    }
}

fn pad_circular(x: &Tensor, dim: usize, before: usize, after: usize) -> Result<Tensor> {
    let extent = x.dim(dim)?;
    if before > extent || after > extent {
        candle_core::bail!(
            "circular padding ({before}, {after}) wraps more than once around dim {dim} of extent {extent}"
        );
    }

    // [tail | x | head]
    let mut pieces = Vec::with_capacity(3);
    if before > 0 {
        pieces.push(x.narrow(dim, extent - before, before)?);
    }
    pieces.push(x.clone());
    if after > 0 {
        pieces.push(x.narrow(dim, 0, after)?);
    }
    Tensor::cat(&pieces, dim)
}

/// Pad the two trailing spatial axes: horizontal first, then vertical.
pub fn pad_spatial(x: &Tensor, spec: &PaddingSpec, modes: AxisModes) -> Result<Tensor> {
    let rank = x.rank();
    if rank < 2 {
        candle_core::bail!("spatial padding expects at least 2 dims, got shape {:?}", x.dims());
    }
    let (left, right) = spec.horizontal();
    let (top, bottom) = spec.vertical();

    let padded = pad_axis(x, rank - 1, left, right, modes.x)?;
    pad_axis(&padded, rank - 2, top, bottom, modes.y)
}
