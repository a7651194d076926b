//! Point sampling of rasters and raster-to-raster resampling
//!
//! Coordinates are normalised by the cell size relative to the raster origin
//! (`Lx = (x - xllcenter) / cellsize`). Bilinear interpolation uses the four surrounding
//! cell centres with weights `(1-dx)(1-dy)`, `dx(1-dy)`, `(1-dx)dy` and `dx dy`; nearest
//! rounds `dx`, `dy` to 0 or 1 before applying the same formula. The identical weights are
//! reused when particles deposit mass onto the grid, which makes deposition the exact
//! transpose of sampling.

use super::raster::{Raster, RasterHeader};
use serde::{Deserialize, Serialize};

/// Interpolation used when sampling a raster at an arbitrary point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpMethod {
    /// Value of the closest cell centre
    Nearest,
    /// Bilinear blend of the four surrounding cell centres
    Bilinear,
}

/// The four cell centres surrounding a point and their weights
///
/// Weight order: `(col0, row0)`, `(col0+1, row0)`, `(col0, row0+1)`, `(col0+1, row0+1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellWeights {
    /// Column of the lower-left corner
    pub col0: usize,
    /// Row of the lower-left corner
    pub row0: usize,
    /// Interpolation weights, summing to 1
    pub weights: [f64; 4],
}

impl CellWeights {
    /// Linear raster indices matching `weights`
    #[inline]
    pub fn indices(&self, ncols: usize) -> [usize; 4] {
        let i00 = self.row0 * ncols + self.col0;
        [i00, i00 + 1, i00 + ncols, i00 + ncols + 1]
    }
}

/// Compute the interpolation stencil of `(x, y)` on `header`.
///
/// Returns `None` when the point lies outside the footprint spanned by the cell centres or
/// is not finite.
pub fn cell_weights(header: &RasterHeader, x: f64, y: f64, method: InterpMethod) -> Option<CellWeights> {
    let lx = (x - header.xllcenter) / header.cellsize;
    let ly = (y - header.yllcenter) / header.cellsize;
    let max_x = (header.ncols - 1) as f64;
    let max_y = (header.nrows - 1) as f64;
    // NaN fails every comparison and lands here too
    if !(lx >= 0.0 && lx <= max_x && ly >= 0.0 && ly <= max_y) {
        return None;
    }

    let col0 = (lx.floor() as usize).min(header.ncols - 2);
    let row0 = (ly.floor() as usize).min(header.nrows - 2);
    let mut dx = lx - col0 as f64;
    let mut dy = ly - row0 as f64;
    if method == InterpMethod::Nearest {
        dx = dx.round();
        dy = dy.round();
    }

    Some(CellWeights {
        col0,
        row0,
        weights: [
            (1.0 - dx) * (1.0 - dy),
            dx * (1.0 - dy),
            (1.0 - dx) * dy,
            dx * dy,
        ],
    })
}

/// Sample `raster` at `(x, y)`; `None` outside the footprint.
///
/// Zero-weight corners are skipped so a no-data neighbour does not poison a point that
/// coincides with a valid cell centre.
pub fn interpolate(raster: &Raster, x: f64, y: f64, method: InterpMethod) -> Option<f64> {
    let stencil = cell_weights(&raster.header, x, y, method)?;
    let idx = stencil.indices(raster.header.ncols);
    let mut value = 0.0;
    for k in 0..4 {
        let w = stencil.weights[k];
        if w != 0.0 {
            value += w * raster.data[idx[k]];
        }
    }
    Some(value)
}

/// Sample `raster` at every `(xs[i], ys[i])`.
///
/// Points outside the raster yield NaN. Returns the sampled values and the number of
/// out-of-bounds points.
pub fn project_on_raster(xs: &[f64], ys: &[f64], raster: &Raster, method: InterpMethod) -> (Vec<f64>, usize) {
    debug_assert_eq!(xs.len(), ys.len());
    let mut out_of_bounds = 0;
    let values: Vec<f64> = xs
        .iter()
        .zip(ys)
        .map(|(&x, &y)| {
            interpolate(raster, x, y, method).unwrap_or_else(|| {
                out_of_bounds += 1;
                f64::NAN
            })
        })
        .collect();
    (values, out_of_bounds)
}

/// Resample `raster` onto the cell centres of `target`. Cells outside the source are NaN.
pub fn resample(raster: &Raster, target: RasterHeader, method: InterpMethod) -> Raster {
    Raster::from_fn(target, |x, y| {
        interpolate(raster, x, y, method).unwrap_or(f64::NAN)
    })
}

/// Bring two rasters of the same extent onto a common grid.
///
/// The finer raster is bilinearly resampled onto the coarser one's cell centres; with
/// equal cell sizes `b` is resampled onto `a`'s header (which realigns shifted headers).
pub fn resize_data(a: &Raster, b: &Raster) -> (Raster, Raster) {
    if b.header.cellsize > a.header.cellsize {
        (resample(a, b.header, InterpMethod::Bilinear), b.clone())
    } else if a.header == b.header {
        (a.clone(), b.clone())
    } else {
        (a.clone(), resample(b, a.header, InterpMethod::Bilinear))
    }
}
