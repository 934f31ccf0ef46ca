//! Seamless tiling for pretrained convolutional networks.
//!
//! Convolution layers normally zero-pad their borders, which leaves a visible
//! seam when the output is tiled edge to edge. This crate swaps the padding
//! step of every [`TileableConv2d`] in a network for circular padding on one
//! or both spatial axes, optionally only for a range of sampling steps,
//! without touching weights, kernel geometry, or output size.
//!
//! The two host operations live in [`nodes`]: [`SeamlessTilingPatch`] for
//! denoising networks and [`CircularDecode`] for latent decoders.

pub mod conv;
pub mod error;
pub mod gate;
pub mod nodes;
pub mod padding;
pub mod patch;
pub mod scan;
pub mod seam;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use conv::{tileable_conv2d, ConvGeometry, PatchedConv, TileableConv2d};
pub use error::{Result, TilingError};
pub use gate::{StepGate, StepRange};
pub use nodes::{CircularDecode, LatentDecoder, NodeKind, SeamlessTilingPatch, TilingMode};
pub use padding::{pad_axis, pad_spatial, AxisMode, AxisModes, NativePadding, PaddingSpec};
pub use patch::{apply, apply_stepped, apply_unconditional, TilingRequest};
pub use scan::{conv_layers, ConvLayers, LayerMut, LayerTree};
pub use seam::{axis_seam, seam_report, AxisSeam, SeamReport};
