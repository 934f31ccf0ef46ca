//! 2D convolution layer with a swappable padding strategy.
//!
//! [`TileableConv2d`] holds the same weights and geometry as a
//! `candle_nn::Conv2d`. By default it behaves exactly like one. Installing a
//! [`PatchedConv`] replaces only the padding step: the input is padded
//! explicitly (horizontal, then vertical) and handed to the unchanged
//! convolution primitive with zero implicit padding.

use candle_core::{Module, Result, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, VarBuilder};

use crate::gate::{StepGate, StepRange};
use crate::padding::{pad_spatial, AxisModes, NativePadding, PaddingSpec};

/// Read-only convolution geometry, passed through to the primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    pub padding: NativePadding,
    pub stride: usize,
    pub dilation: usize,
    pub groups: usize,
}

impl Default for ConvGeometry {
    fn default() -> Self {
        Self {
            padding: NativePadding::default(),
            stride: 1,
            dilation: 1,
            groups: 1,
        }
    }
}

impl From<&Conv2dConfig> for ConvGeometry {
    fn from(cfg: &Conv2dConfig) -> Self {
        Self {
            padding: NativePadding::symmetric(cfg.padding),
            stride: cfg.stride,
            dilation: cfg.dilation,
            groups: cfg.groups,
        }
    }
}

/// Replacement padding behaviour bound to one layer.
///
/// With a [`StepGate`] (stepped variant) the configured modes apply only to
/// in-range steps and every other step falls back to zero padding. Without
/// one (unconditional variant) the configured modes always apply.
#[derive(Debug, Clone)]
pub struct PatchedConv {
    padding: PaddingSpec,
    modes: AxisModes,
    gate: Option<StepGate>,
}

impl PatchedConv {
    fn stepped(padding: NativePadding, modes: AxisModes, range: StepRange) -> Self {
        Self {
            padding: PaddingSpec::derive(padding),
            modes,
            gate: Some(StepGate::new(range)),
        }
    }

    fn unconditional(padding: NativePadding, modes: AxisModes) -> Self {
        Self {
            padding: PaddingSpec::derive(padding),
            modes,
            gate: None,
        }
    }

    pub fn padding(&self) -> &PaddingSpec {
        &self.padding
    }

    /// Configured modes, before any gating.
    pub fn modes(&self) -> AxisModes {
        self.modes
    }

    pub fn gate(&self) -> Option<&StepGate> {
        self.gate.as_ref()
    }

    /// Resolve the modes for this invocation, advancing the gate if any.
    pub fn next_modes(&self) -> AxisModes {
        match &self.gate {
            Some(gate) if !gate.advance() => AxisModes::CONSTANT,
            _ => self.modes,
        }
    }

    /// Pad `x` for the current invocation.
    pub fn pad(&self, x: &Tensor) -> Result<Tensor> {
        pad_spatial(x, &self.padding, self.next_modes())
    }
}

#[derive(Debug, Clone)]
enum ConvStrategy {
    Native,
    Patched(PatchedConv),
}

/// A 2D convolution whose padding behaviour can be replaced at inference time
/// without touching its weights.
#[derive(Debug, Clone)]
pub struct TileableConv2d {
    weight: Tensor,
    bias: Option<Tensor>,
    geometry: ConvGeometry,
    strategy: ConvStrategy,
}

impl TileableConv2d {
    pub fn new(weight: Tensor, bias: Option<Tensor>, geometry: ConvGeometry) -> Self {
        Self {
            weight,
            bias,
            geometry,
            strategy: ConvStrategy::Native,
        }
    }

    /// Wrap an existing candle convolution, sharing its weight storage.
    pub fn from_conv2d(conv: &Conv2d) -> Self {
        Self::new(
            conv.weight().clone(),
            conv.bias().cloned(),
            ConvGeometry::from(conv.config()),
        )
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }

    pub fn geometry(&self) -> &ConvGeometry {
        &self.geometry
    }

    pub fn patch(&self) -> Option<&PatchedConv> {
        match &self.strategy {
            ConvStrategy::Native => None,
            ConvStrategy::Patched(patch) => Some(patch),
        }
    }

    pub fn is_patched(&self) -> bool {
        self.patch().is_some()
    }

    /// Pad with `modes` on steps inside `range` and with zeros on every other
    /// step. The counter starts at zero. Any previous patch is replaced.
    pub fn install_stepped(&mut self, modes: AxisModes, range: StepRange) {
        let patch = PatchedConv::stepped(self.geometry.padding, modes, range);
        self.strategy = ConvStrategy::Patched(patch);
    }

    /// Always pad with `modes`. Any previous patch is replaced.
    pub fn install_unconditional(&mut self, modes: AxisModes) {
        let patch = PatchedConv::unconditional(self.geometry.padding, modes);
        self.strategy = ConvStrategy::Patched(patch);
    }

    /// The layer's own convolution primitive with the given implicit padding.
    fn convolve(&self, x: &Tensor, padding: usize) -> Result<Tensor> {
        let ConvGeometry {
            stride,
            dilation,
            groups,
            ..
        } = self.geometry;
        let out = x.conv2d(&self.weight, padding, stride, dilation, groups)?;
        match &self.bias {
            None => Ok(out),
            Some(bias) => {
                let channels = bias.dims1()?;
                let bias = bias.reshape((1, channels, 1, 1))?;
                out.broadcast_add(&bias)
            }
        }
    }

    fn forward_native(&self, x: &Tensor) -> Result<Tensor> {
        let native = self.geometry.padding;
        if native.is_uniform() {
            return self.convolve(x, native.height);
        }
        let padded = pad_spatial(x, &PaddingSpec::derive(native), AxisModes::CONSTANT)?;
        self.convolve(&padded, 0)
    }
}

impl Module for TileableConv2d {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        match &self.strategy {
            ConvStrategy::Native => self.forward_native(x),
            ConvStrategy::Patched(patch) => {
                let padded = patch.pad(x)?;
                self.convolve(&padded, 0)
            }
        }
    }
}

/// Build a [`TileableConv2d`] the same way `candle_nn::conv2d` builds a layer.
pub fn tileable_conv2d(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    cfg: Conv2dConfig,
    vb: VarBuilder,
) -> Result<TileableConv2d> {
    let conv = candle_nn::conv2d(in_channels, out_channels, kernel_size, cfg, vb)?;
    Ok(TileableConv2d::from_conv2d(&conv))
}
