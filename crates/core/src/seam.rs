//! Seam diagnostics for generated images.
//!
//! An image tiles seamlessly along an axis when the jump across the
//! wrap-around edge (last column back to first, or last row back to first)
//! looks like any other step between neighbours. [`seam_report`] measures both.

use candle_core::{DType, Result, Tensor};

/// Wrap-around versus interior discontinuity along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSeam {
    /// Mean absolute difference between the last and first slice.
    pub wrap: f32,
    /// Mean absolute difference between adjacent interior slices.
    pub interior: f32,
}

impl AxisSeam {
    /// `wrap / interior`; close to 1.0 for a seamless axis.
    pub fn ratio(&self) -> f32 {
        if self.interior <= f32::EPSILON {
            if self.wrap <= f32::EPSILON {
                1.0
            } else {
                f32::INFINITY
            }
        } else {
            self.wrap / self.interior
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeamReport {
    pub horizontal: AxisSeam,
    pub vertical: AxisSeam,
}

fn mean_abs_diff(a: &Tensor, b: &Tensor) -> Result<f32> {
    (a - b)?.abs()?.mean_all()?.to_scalar::<f32>()
}

/// Measure the seam along `dim`.
pub fn axis_seam(image: &Tensor, dim: usize) -> Result<AxisSeam> {
    let image = image.to_dtype(DType::F32)?;
    let extent = image.dim(dim)?;
    if extent < 2 {
        candle_core::bail!("seam measurement needs at least 2 elements along dim {dim}, got {extent}");
    }
    let first = image.narrow(dim, 0, 1)?;
    let last = image.narrow(dim, extent - 1, 1)?;
    let wrap = mean_abs_diff(&last, &first)?;

    let head = image.narrow(dim, 0, extent - 1)?;
    let tail = image.narrow(dim, 1, extent - 1)?;
    let interior = mean_abs_diff(&tail, &head)?;

    Ok(AxisSeam { wrap, interior })
}

/// Measure both spatial seams of a `[..., height, width]` image.
pub fn seam_report(image: &Tensor) -> Result<SeamReport> {
    let rank = image.rank();
    if rank < 2 {
        candle_core::bail!("seam report expects at least 2 dims, got shape {:?}", image.dims());
    }
    Ok(SeamReport {
        horizontal: axis_seam(image, rank - 1)?,
        vertical: axis_seam(image, rank - 2)?,
    })
}
