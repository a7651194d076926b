//! Path-following `(s, l)` coordinate system
//!
//! The path is resampled at constant horizontal spacing `ds`, every sample gets the
//! bisector normal of its adjacent segments, and the lateral coordinate runs from
//! `-w/2` to `+w/2` (rounded up to whole cells) in steps of `dl`. Grid point `(k, j)` is
//! `x_k + l_j n_k`.
//!
//! Transformed rasters reuse [`Raster`]: row `k` is the `s` index, column `j` the `l`
//! index, so the header has `nrows = nS`, `ncols = nL`, `yllcenter = 0` and
//! `xllcenter = -w/2`. Samples outside the DEM are NaN.

use crate::config::AimecConfig;
use crate::error::{AvaError, AvaResult};
use crate::grid::dem::Dem;
use crate::grid::interpolation::{interpolate, project_on_raster, InterpMethod};
use crate::grid::path::{arc_length, path_to_domain, PathDomain, Profile};
use crate::grid::polygon::Polyline;
use crate::grid::raster::{Raster, RasterHeader};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Mapping between DEM coordinates and path coordinates
#[derive(Debug, Clone)]
pub struct PathTransform {
    profile: Profile,
    domain: PathDomain,
    l: Vec<f64>,
    grid_x: Vec<f64>,
    grid_y: Vec<f64>,
    ds: f64,
    dl: f64,
}

impl PathTransform {
    /// Build the transform for `path` (world coordinates) on `dem`.
    ///
    /// The path is reversed if it runs uphill. Fails with [`AvaError::OutOfDem`] if the
    /// path leaves the DEM.
    pub fn new(dem: &Dem, path: &Polyline, cfg: &AimecConfig) -> AvaResult<Self> {
        cfg.validate()?;
        if path.len() < 2 {
            return Err(AvaError::config(
                "path",
                format!("path '{}' needs at least two vertices", path.name),
            ));
        }
        let cellsize = dem.header().cellsize;
        let ds = cfg.cell_size_sl.unwrap_or(cellsize);
        let dl = ds;

        let (ox, oy) = dem.from_world(0.0, 0.0);
        let mut local = path.translated(ox, oy);
        dem.check_inside(&local.x, &local.y, &format!("path '{}'", path.name))?;

        // Orient downhill before resampling so that sample k sits at s = k ds
        let n = local.len();
        let z_first = dem.elevation_at(local.x[0], local.y[0], InterpMethod::Bilinear);
        let z_last = dem.elevation_at(local.x[n - 1], local.y[n - 1], InterpMethod::Bilinear);
        if let (Some(first), Some(last)) = (z_first, z_last) {
            if first < last {
                debug!("Path '{}' runs uphill, reversed", path.name);
                local.x.reverse();
                local.y.reverse();
            }
        }

        let (x, y) = resample_uniform(&local.x, &local.y, ds);
        let (z, n_out) = project_on_raster(&x, &y, dem.elevation(), InterpMethod::Bilinear);
        if n_out > 0 || z.iter().any(|v| !v.is_finite()) {
            return Err(AvaError::out_of_dem(format!("path '{}' (no-data crossing)", path.name)));
        }
        let s = arc_length(&x, &y);
        let profile = Profile {
            name: path.name.clone(),
            x,
            y,
            z,
            s,
            split_index: None,
        };
        let domain = path_to_domain(&profile.x, &profile.y, cfg.domain_width, dl)?;
        let n_l = (2.0 * domain.half_width / dl).round() as usize + 1;
        let l: Vec<f64> = (0..n_l).map(|j| -domain.half_width + j as f64 * dl).collect();

        let n_s = profile.len();
        let mut grid_x = Vec::with_capacity(n_s * n_l);
        let mut grid_y = Vec::with_capacity(n_s * n_l);
        for k in 0..n_s {
            for &lj in &l {
                grid_x.push(profile.x[k] + lj * domain.normal_x[k]);
                grid_y.push(profile.y[k] + lj * domain.normal_y[k]);
            }
        }
        let outside = grid_x
            .iter()
            .zip(&grid_y)
            .filter(|&(&gx, &gy)| !dem.header().contains(gx, gy))
            .count();
        if outside > 0 {
            warn!(
                "{} of {} path-domain points of '{}' lie outside the DEM and are masked",
                outside,
                grid_x.len(),
                path.name
            );
        }

        Ok(Self {
            profile,
            domain,
            l,
            grid_x,
            grid_y,
            ds,
            dl,
        })
    }

    /// Number of samples along the path
    pub fn n_s(&self) -> usize {
        self.profile.len()
    }

    /// Number of lateral samples
    pub fn n_l(&self) -> usize {
        self.l.len()
    }

    /// Resampled path with elevations and arc length
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Normals and lateral boundaries
    pub fn domain(&self) -> &PathDomain {
        &self.domain
    }

    /// Arc length of each path sample
    pub fn s(&self) -> &[f64] {
        &self.profile.s
    }

    /// Lateral coordinates
    pub fn l(&self) -> &[f64] {
        &self.l
    }

    /// DEM coordinates of grid point `(k, j)`
    pub fn point(&self, k: usize, j: usize) -> (f64, f64) {
        let i = k * self.n_l() + j;
        (self.grid_x[i], self.grid_y[i])
    }

    /// Header of transformed rasters
    pub fn sl_header(&self) -> RasterHeader {
        RasterHeader::new(self.n_l(), self.n_s(), self.ds, -self.domain.half_width, 0.0)
    }

    /// Resample `raster` (DEM coordinates) onto the `(s, l)` grid
    pub fn transform(&self, raster: &Raster) -> Raster {
        let data: Vec<f64> = self
            .grid_x
            .par_iter()
            .zip(self.grid_y.par_iter())
            .map(|(&x, &y)| interpolate(raster, x, y, InterpMethod::Bilinear).unwrap_or(f64::NAN))
            .collect();
        Raster {
            header: self.sl_header(),
            data,
        }
    }

    /// Path coordinates `(s, l)` of a DEM point.
    ///
    /// The point is projected onto the nearest path segment; `l` is positive on the side
    /// the normals point to. `None` when no segment is within the domain half width.
    pub fn to_path_coordinates(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let p = &self.profile;
        let mut best: Option<(f64, f64)> = None;
        for k in 0..p.len() - 1 {
            let (ax, ay) = (p.x[k], p.y[k]);
            let (dx, dy) = (p.x[k + 1] - ax, p.y[k + 1] - ay);
            let len2 = dx * dx + dy * dy;
            if len2 == 0.0 {
                continue;
            }
            let t = (((x - ax) * dx + (y - ay) * dy) / len2).clamp(0.0, 1.0);
            let (px, py) = (ax + t * dx, ay + t * dy);
            let dist = (x - px).hypot(y - py);
            if best.is_some_and(|(_, d)| d <= dist) {
                continue;
            }
            let len = len2.sqrt();
            let side = (dx * (y - ay) - dy * (x - ax)) / len;
            let s = p.s[k] + t * len;
            best = Some((s, side.signum() * dist));
        }
        let (s, l) = best?;
        (l.abs() <= self.domain.half_width + 1e-9).then_some((s, l))
    }

    /// Map an `(s, l)` raster back onto the grid `target` (DEM coordinates).
    ///
    /// Cells outside the path domain are NaN.
    pub fn inverse(&self, sl: &Raster, target: RasterHeader) -> Raster {
        let data: Vec<f64> = (0..target.len())
            .into_par_iter()
            .map(|idx| {
                let (x, y) = target.cell_center(idx % target.ncols, idx / target.ncols);
                self.to_path_coordinates(x, y)
                    .and_then(|(s, l)| interpolate(sl, l, s, InterpMethod::Bilinear))
                    .unwrap_or(f64::NAN)
            })
            .collect();
        Raster { header: target, data }
    }

    /// Along-path spacing
    pub fn ds(&self) -> f64 {
        self.ds
    }

    /// Lateral spacing
    pub fn dl(&self) -> f64 {
        self.dl
    }
}

/// Resample a polyline at constant spacing along its length, keeping both end points
fn resample_uniform(x: &[f64], y: &[f64], spacing: f64) -> (Vec<f64>, Vec<f64>) {
    let s = arc_length(x, y);
    let total = s.last().copied().unwrap_or(0.0);
    let n = (total / spacing).floor() as usize;
    let mut rx = Vec::with_capacity(n + 2);
    let mut ry = Vec::with_capacity(n + 2);
    let mut seg = 0;
    for i in 0..=n {
        let target = i as f64 * spacing;
        while seg + 2 < s.len() && s[seg + 1] < target {
            seg += 1;
        }
        let len = s[seg + 1] - s[seg];
        let t = if len > 0.0 { (target - s[seg]) / len } else { 0.0 };
        rx.push(x[seg] + t * (x[seg + 1] - x[seg]));
        ry.push(y[seg] + t * (y[seg + 1] - y[seg]));
    }
    if total - n as f64 * spacing > 1e-9 * spacing.max(1.0) {
        rx.push(x[x.len() - 1]);
        ry.push(y[y.len() - 1]);
    }
    (rx, ry)
}
