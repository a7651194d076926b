//! Digital elevation model with its derived fields
//!
//! A [`Dem`] is built once per run and is immutable afterwards. Construction:
//! - maps the file no-data sentinel to NaN,
//! - moves the origin so the lower-left cell centre is `(0, 0)` (the original header is
//!   kept so outputs can be shifted back),
//! - computes unit surface normals, true cell areas and the outside (no-data) mask,
//! - derives the header of the neighbour-search grid whose cell size is the SPH kernel
//!   radius.
//!
//! The synthetic constructors ([`Dem::flat`], [`Dem::inclined_plane`], [`Dem::bowl`],
//! [`Dem::parabolic_channel`]) reproduce the benchmark topographies.

use super::interpolation::{interpolate, InterpMethod};
use super::normals::{get_area_mesh, get_normal_mesh, NormalMethod};
use super::raster::{Raster, RasterHeader};
use crate::core_types::vector_ops::normalize;
use crate::core_types::Vec3;
use crate::error::{AvaError, AvaResult};
use tracing::debug;

/// Terrain and the static fields derived from it
#[derive(Debug, Clone)]
pub struct Dem {
    original_header: RasterHeader,
    header: RasterHeader,
    elevation: Raster,
    nx: Raster,
    ny: Raster,
    nz: Raster,
    area: Raster,
    outside: Vec<bool>,
    neighbour_header: RasterHeader,
}

impl Dem {
    /// Build a DEM from an elevation raster in world coordinates
    ///
    /// # Arguments
    ///
    /// * `raster` - Elevations; cells equal to `header.nodata_value` (or NaN) are no-data
    /// * `method` - Normal discretisation
    /// * `kernel_radius` - SPH kernel radius, used as the neighbour-grid cell size
    pub fn new(raster: Raster, method: NormalMethod, kernel_radius: f64) -> AvaResult<Self> {
        let original_header = raster.header;
        original_header.validate()?;
        if !(kernel_radius.is_finite() && kernel_radius > 0.0) {
            return Err(AvaError::config(
                "sphKernelRadius",
                format!("must be finite and positive, got {kernel_radius}"),
            ));
        }

        let header = original_header.with_origin_at_zero();
        let nodata = original_header.nodata_value;
        let data: Vec<f64> = raster
            .data
            .into_iter()
            .map(|z| if z == nodata { f64::NAN } else { z })
            .collect();
        let elevation = Raster::from_data(header, data)?;
        let outside = elevation.data.iter().map(|z| z.is_nan()).collect();

        let (mut nx, mut ny, mut nz) = get_normal_mesh(&elevation, method);
        normalize(&mut nx.data, &mut ny.data, &mut nz.data);
        let area = get_area_mesh(&nx, &ny, &nz, header.cellsize);

        let neighbour_header = neighbour_grid_header(&header, kernel_radius);
        debug!(
            "DEM ready: {}x{} cells of {:.2} m, neighbour grid {}x{} of {:.2} m",
            header.ncols,
            header.nrows,
            header.cellsize,
            neighbour_header.ncols,
            neighbour_header.nrows,
            kernel_radius
        );

        Ok(Self {
            original_header,
            header,
            elevation,
            nx,
            ny,
            nz,
            area,
            outside,
            neighbour_header,
        })
    }

    /// DEM whose elevation is `f(x, y)` at cell centres (origin at `(0, 0)`)
    pub fn from_fn<F>(
        ncols: usize,
        nrows: usize,
        cellsize: f64,
        method: NormalMethod,
        kernel_radius: f64,
        f: F,
    ) -> AvaResult<Self>
    where
        F: Fn(f64, f64) -> f64,
    {
        let header = RasterHeader::new(ncols, nrows, cellsize, 0.0, 0.0);
        Self::new(Raster::from_fn(header, f), method, kernel_radius)
    }

    /// Flat terrain at given elevation
    pub fn flat(ncols: usize, nrows: usize, cellsize: f64, elevation: f64, kernel_radius: f64) -> AvaResult<Self> {
        Self::from_fn(ncols, nrows, cellsize, NormalMethod::Four, kernel_radius, |_, _| elevation)
    }

    /// Plane descending in +x at `slope_deg`, reaching zero at the right edge
    pub fn inclined_plane(
        ncols: usize,
        nrows: usize,
        cellsize: f64,
        slope_deg: f64,
        kernel_radius: f64,
    ) -> AvaResult<Self> {
        let x_max = (ncols - 1) as f64 * cellsize;
        let tan = slope_deg.to_radians().tan();
        Self::from_fn(ncols, nrows, cellsize, NormalMethod::Four, kernel_radius, move |x, _| {
            (x_max - x) * tan
        })
    }

    /// Axisymmetric parabolic bowl centred in the domain
    ///
    /// Elevation is `rim_height * (r / rim_radius)^2`.
    pub fn bowl(
        ncols: usize,
        nrows: usize,
        cellsize: f64,
        rim_radius: f64,
        rim_height: f64,
        kernel_radius: f64,
    ) -> AvaResult<Self> {
        let cx = (ncols - 1) as f64 * cellsize / 2.0;
        let cy = (nrows - 1) as f64 * cellsize / 2.0;
        Self::from_fn(ncols, nrows, cellsize, NormalMethod::Four, kernel_radius, move |x, y| {
            let r2 = (x - cx).powi(2) + (y - cy).powi(2);
            rim_height * r2 / (rim_radius * rim_radius)
        })
    }

    /// Parabolic slope flattening into a horizontal runout, with a shallow lateral channel
    ///
    /// Along x: `drop_height * (1 - x / length)^2` for `x < length`, zero beyond.
    /// Across y: a parabola of `channel_depth` at the domain edges.
    pub fn parabolic_channel(
        ncols: usize,
        nrows: usize,
        cellsize: f64,
        drop_height: f64,
        length: f64,
        channel_depth: f64,
        kernel_radius: f64,
    ) -> AvaResult<Self> {
        let cy = (nrows - 1) as f64 * cellsize / 2.0;
        let half_width = cy.max(cellsize);
        Self::from_fn(ncols, nrows, cellsize, NormalMethod::Four, kernel_radius, move |x, y| {
            let along = if x < length {
                drop_height * (1.0 - x / length).powi(2)
            } else {
                0.0
            };
            along + channel_depth * ((y - cy) / half_width).powi(2)
        })
    }

    /// Same terrain with a neighbour grid for another kernel radius
    pub fn with_kernel_radius(&self, kernel_radius: f64) -> AvaResult<Self> {
        if !(kernel_radius.is_finite() && kernel_radius > 0.0) {
            return Err(AvaError::config(
                "sphKernelRadius",
                format!("must be finite and positive, got {kernel_radius}"),
            ));
        }
        let mut dem = self.clone();
        dem.neighbour_header = neighbour_grid_header(&self.header, kernel_radius);
        Ok(dem)
    }

    /// Header with the origin moved to `(0, 0)`; all particle coordinates use it
    pub fn header(&self) -> &RasterHeader {
        &self.header
    }

    /// Header as read from the input (for re-shifting outputs)
    pub fn original_header(&self) -> &RasterHeader {
        &self.original_header
    }

    /// Header of the neighbour-search grid
    pub fn neighbour_header(&self) -> &RasterHeader {
        &self.neighbour_header
    }

    /// Elevations (NaN for no-data)
    pub fn elevation(&self) -> &Raster {
        &self.elevation
    }

    /// Unit normal components
    pub fn normals(&self) -> (&Raster, &Raster, &Raster) {
        (&self.nx, &self.ny, &self.nz)
    }

    /// True surface area per cell
    pub fn area(&self) -> &Raster {
        &self.area
    }

    /// Whether cell `idx` is a no-data cell
    #[inline]
    pub fn is_outside(&self, idx: usize) -> bool {
        self.outside[idx]
    }

    /// Outside mask, one flag per cell
    pub fn outside_mask(&self) -> &[bool] {
        &self.outside
    }

    /// Elevation at `(x, y)` in DEM coordinates
    pub fn elevation_at(&self, x: f64, y: f64, method: InterpMethod) -> Option<f64> {
        interpolate(&self.elevation, x, y, method).filter(|z| z.is_finite())
    }

    /// Interpolated unit normal at `(x, y)`
    pub fn normal_at(&self, x: f64, y: f64, method: InterpMethod) -> Option<Vec3> {
        let n = Vec3::new(
            interpolate(&self.nx, x, y, method)?,
            interpolate(&self.ny, x, y, method)?,
            interpolate(&self.nz, x, y, method)?,
        );
        let len = n.norm();
        (len.is_finite() && len > 0.0).then(|| n / len)
    }

    /// Slope angle in degrees at `(x, y)`
    pub fn slope_at(&self, x: f64, y: f64) -> Option<f64> {
        self.normal_at(x, y, InterpMethod::Bilinear)
            .map(|n| n.z.clamp(-1.0, 1.0).acos().to_degrees())
    }

    /// World coordinates of an internal point
    pub fn to_world(&self, x: f64, y: f64) -> (f64, f64) {
        (x + self.original_header.xllcenter, y + self.original_header.yllcenter)
    }

    /// Internal coordinates of a world point
    pub fn from_world(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.original_header.xllcenter, y - self.original_header.yllcenter)
    }

    /// Fail with [`AvaError::OutOfDem`] if the bounding box of the points exceeds the DEM.
    ///
    /// Coordinates are internal (origin-shifted).
    pub fn check_inside(&self, xs: &[f64], ys: &[f64], what: &str) -> AvaResult<()> {
        let inside = xs
            .iter()
            .zip(ys)
            .all(|(&x, &y)| self.header.contains(x, y));
        if inside {
            Ok(())
        } else {
            Err(AvaError::out_of_dem(what))
        }
    }

    /// Copy of an internal raster re-shifted to world coordinates
    pub fn to_world_raster(&self, raster: &Raster) -> Raster {
        let mut header = raster.header;
        header.xllcenter += self.original_header.xllcenter;
        header.yllcenter += self.original_header.yllcenter;
        header.nodata_value = self.original_header.nodata_value;
        Raster {
            header,
            data: raster.data.clone(),
        }
    }
}

/// Header of a grid covering `dem` with cells of size `radius`
pub fn neighbour_grid_header(dem: &RasterHeader, radius: f64) -> RasterHeader {
    let width = (dem.ncols - 1) as f64 * dem.cellsize;
    let height = (dem.nrows - 1) as f64 * dem.cellsize;
    let ncols = (width / radius).ceil() as usize + 1;
    let nrows = (height / radius).ceil() as usize + 1;
    RasterHeader::new(ncols, nrows, radius, dem.xllcenter, dem.yllcenter)
}
