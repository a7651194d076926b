//! Raster header and row-major raster container
//!
//! Rasters follow the ESRI ASCII grid convention of values located at cell centres.
//! Internally row 0 is the southern-most row (`y = yllcenter`), so that
//! `data[row * ncols + col]` sits at `(xllcenter + col * cellsize, yllcenter + row * cellsize)`.
//! The io crate flips rows when reading or writing files.

use crate::error::{AvaError, AvaResult};
use serde::{Deserialize, Serialize};

/// Geo-referencing and shape of a regular raster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterHeader {
    /// Number of columns (x direction)
    pub ncols: usize,
    /// Number of rows (y direction)
    pub nrows: usize,
    /// Cell size in meters
    pub cellsize: f64,
    /// x coordinate of the centre of the lower-left cell
    pub xllcenter: f64,
    /// y coordinate of the centre of the lower-left cell
    pub yllcenter: f64,
    /// Sentinel used in files for missing values; NaN internally
    pub nodata_value: f64,
}

impl RasterHeader {
    /// Create a header with the lower-left cell centre at `(xll, yll)`
    pub fn new(ncols: usize, nrows: usize, cellsize: f64, xll: f64, yll: f64) -> Self {
        Self {
            ncols,
            nrows,
            cellsize,
            xllcenter: xll,
            yllcenter: yll,
            nodata_value: -9999.0,
        }
    }

    /// Total number of cells
    #[inline]
    pub fn len(&self) -> usize {
        self.ncols * self.nrows
    }

    /// Whether the raster has no cells
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear index of `(col, row)`
    #[inline]
    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.ncols + col
    }

    /// Same header moved so that the lower-left cell centre is at the origin
    pub fn with_origin_at_zero(&self) -> Self {
        Self {
            xllcenter: 0.0,
            yllcenter: 0.0,
            ..*self
        }
    }

    /// x extent covered by cell centres
    pub fn x_max(&self) -> f64 {
        self.xllcenter + (self.ncols.saturating_sub(1)) as f64 * self.cellsize
    }

    /// y extent covered by cell centres
    pub fn y_max(&self) -> f64 {
        self.yllcenter + (self.nrows.saturating_sub(1)) as f64 * self.cellsize
    }

    /// World coordinates of the centre of `(col, row)`
    #[inline]
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.xllcenter + col as f64 * self.cellsize,
            self.yllcenter + row as f64 * self.cellsize,
        )
    }

    /// Whether `(x, y)` lies inside the footprint spanned by the cell centres
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xllcenter && x <= self.x_max() && y >= self.yllcenter && y <= self.y_max()
    }

    /// Validate dimensions and cell size
    pub fn validate(&self) -> AvaResult<()> {
        if self.ncols < 2 || self.nrows < 2 {
            return Err(AvaError::config(
                "ncols/nrows",
                format!("raster needs at least 2x2 cells, got {}x{}", self.ncols, self.nrows),
            ));
        }
        if !(self.cellsize.is_finite() && self.cellsize > 0.0) {
            return Err(AvaError::config(
                "cellsize",
                format!("must be finite and positive, got {}", self.cellsize),
            ));
        }
        Ok(())
    }
}

/// Row-major raster of `f64` values with its header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    /// Shape and geo-referencing
    pub header: RasterHeader,
    /// Values in row-major order (`row * ncols + col`)
    pub data: Vec<f64>,
}

impl Raster {
    /// Zero-filled raster
    pub fn zeros(header: RasterHeader) -> Self {
        Self::with_value(header, 0.0)
    }

    /// Raster filled with `value`
    pub fn with_value(header: RasterHeader, value: f64) -> Self {
        Self {
            header,
            data: vec![value; header.len()],
        }
    }

    /// Wrap existing data, checking its length
    pub fn from_data(header: RasterHeader, data: Vec<f64>) -> AvaResult<Self> {
        if data.len() != header.len() {
            return Err(AvaError::shape("raster data", header.len(), data.len()));
        }
        Ok(Self { header, data })
    }

    /// Build a raster by evaluating `f(x, y)` at every cell centre
    pub fn from_fn<F>(header: RasterHeader, f: F) -> Self
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut data = Vec::with_capacity(header.len());
        for row in 0..header.nrows {
            for col in 0..header.ncols {
                let (x, y) = header.cell_center(col, row);
                data.push(f(x, y));
            }
        }
        Self { header, data }
    }

    /// Value at `(col, row)`
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[inline]
    pub fn get(&self, col: usize, row: usize) -> f64 {
        assert!(
            col < self.header.ncols && row < self.header.nrows,
            "Coordinates out of bounds"
        );
        self.data[self.header.index(col, row)]
    }

    /// Set value at `(col, row)`
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[inline]
    pub fn set(&mut self, col: usize, row: usize, value: f64) {
        assert!(
            col < self.header.ncols && row < self.header.nrows,
            "Coordinates out of bounds"
        );
        let idx = self.header.index(col, row);
        self.data[idx] = value;
    }

    /// Fill entire raster with a value
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Borrow values
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Borrow values mutably
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Maximum over finite values (`None` if there are none)
    pub fn max_finite(&self) -> Option<f64> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    /// Sum over finite values
    pub fn sum_finite(&self) -> f64 {
        self.data.iter().filter(|v| v.is_finite()).sum()
    }

    /// Element-wise `self = max(self, other)`; used for peak rasters
    pub fn max_assign(&mut self, other: &Raster) -> AvaResult<()> {
        if other.data.len() != self.data.len() {
            return Err(AvaError::shape("peak raster", self.data.len(), other.data.len()));
        }
        for (peak, &v) in self.data.iter_mut().zip(&other.data) {
            if v > *peak {
                *peak = v;
            }
        }
        Ok(())
    }

    /// Copy of this raster with every value multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Raster {
        Raster {
            header: self.header,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    /// Same data, header shifted by `(dx, dy)`
    pub fn translated(&self, dx: f64, dy: f64) -> Raster {
        let mut header = self.header;
        header.xllcenter += dx;
        header.yllcenter += dy;
        Raster {
            header,
            data: self.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> RasterHeader {
        RasterHeader::new(10, 20, 5.0, 100.0, 200.0)
    }

    #[test]
    fn test_raster_creation() {
        let raster = Raster::zeros(header());
        assert_eq!(raster.data.len(), 200);
        assert!(raster.data.iter().all(|&v| v == 0.0));
        assert!(Raster::from_data(header(), vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_raster_get_set_row_major() {
        let mut raster = Raster::zeros(header());
        raster.set(3, 4, 123.45);
        assert_eq!(raster.get(3, 4), 123.45);
        assert_eq!(raster.data[4 * 10 + 3], 123.45);
    }

    #[test]
    #[should_panic(expected = "Coordinates out of bounds")]
    fn test_raster_bounds_check() {
        let raster = Raster::zeros(header());
        let _ = raster.get(10, 5);
    }

    #[test]
    fn test_cell_centers_and_extent() {
        let h = header();
        assert_eq!(h.cell_center(0, 0), (100.0, 200.0));
        assert_eq!(h.cell_center(9, 19), (145.0, 295.0));
        assert!(h.contains(145.0, 295.0));
        assert!(!h.contains(145.1, 295.0));
        assert_eq!(h.with_origin_at_zero().cell_center(1, 1), (5.0, 5.0));
    }

    #[test]
    fn test_max_assign_is_monotone() {
        let mut peak = Raster::with_value(header(), 1.0);
        let mut current = Raster::zeros(header());
        current.set(0, 0, 5.0);
        peak.max_assign(&current).unwrap();
        assert_eq!(peak.get(0, 0), 5.0);
        assert_eq!(peak.get(1, 0), 1.0);
    }

    #[test]
    fn test_from_fn_and_max_finite() {
        let raster = Raster::from_fn(header(), |x, _| if x > 140.0 { f64::NAN } else { x });
        assert_eq!(raster.max_finite(), Some(140.0));
    }
}
