//! Polygon sets and their rasterisation
//!
//! Release, entrainment, resistance and secondary-release areas arrive as a [`LineSet`]:
//! concatenated coordinate arrays plus `(start, length)` spans per feature, feature names
//! and optional per-feature thickness (`d0`). Rasterisation marks every cell centre that
//! lies inside a polygon, or within a tolerance radius of its boundary.

use super::dem::Dem;
use super::raster::{Raster, RasterHeader};
use crate::error::{AvaError, AvaResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Collection of named polygons or polylines in world coordinates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineSet {
    /// Feature names
    pub name: Vec<String>,
    /// Index of each feature's first vertex in `x`/`y`
    pub start: Vec<usize>,
    /// Number of vertices of each feature
    pub length: Vec<usize>,
    /// Concatenated x coordinates
    pub x: Vec<f64>,
    /// Concatenated y coordinates
    pub y: Vec<f64>,
    /// Optional per-feature thickness attribute (`d0`)
    pub thickness: Vec<Option<f64>>,
}

/// A single polygon or polyline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    /// Name of the feature
    pub name: String,
    /// Vertex x coordinates
    pub x: Vec<f64>,
    /// Vertex y coordinates
    pub y: Vec<f64>,
}

impl Polyline {
    /// Create a named polyline
    pub fn new(name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            x,
            y,
        }
    }

    /// Axis-aligned rectangle as a closed polygon (counter-clockwise)
    pub fn rectangle(name: impl Into<String>, x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(name, vec![x0, x1, x1, x0], vec![y0, y0, y1, y1])
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the polyline has no vertices
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Copy shifted by `(dx, dy)`
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            name: self.name.clone(),
            x: self.x.iter().map(|v| v + dx).collect(),
            y: self.y.iter().map(|v| v + dy).collect(),
        }
    }

    /// Signed shoelace area (positive for counter-clockwise polygons)
    pub fn signed_area(&self) -> f64 {
        let n = self.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        let mut j = n - 1;
        for i in 0..n {
            sum += self.x[j] * self.y[i] - self.x[i] * self.y[j];
            j = i;
        }
        sum / 2.0
    }

    /// Minimum and maximum of x and y: `(xmin, xmax, ymin, ymax)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let fold = |v: &[f64]| {
            v.iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| (lo.min(c), hi.max(c)))
        };
        let (xmin, xmax) = fold(&self.x);
        let (ymin, ymax) = fold(&self.y);
        (xmin, xmax, ymin, ymax)
    }
}

impl LineSet {
    /// Build a line set from individual features
    pub fn from_polylines(features: &[Polyline], thickness: &[Option<f64>]) -> AvaResult<Self> {
        if !thickness.is_empty() && thickness.len() != features.len() {
            return Err(AvaError::shape("feature thickness", features.len(), thickness.len()));
        }
        let mut set = LineSet::default();
        for (i, f) in features.iter().enumerate() {
            if f.x.len() != f.y.len() {
                return Err(AvaError::shape(format!("coordinates of {}", f.name), f.x.len(), f.y.len()));
            }
            set.name.push(f.name.clone());
            set.start.push(set.x.len());
            set.length.push(f.len());
            set.x.extend_from_slice(&f.x);
            set.y.extend_from_slice(&f.y);
            set.thickness.push(thickness.get(i).copied().flatten());
        }
        Ok(set)
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.name.len()
    }

    /// Whether there are no features
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Feature `i` as a stand-alone polyline
    pub fn feature(&self, i: usize) -> Polyline {
        let range = self.start[i]..self.start[i] + self.length[i];
        Polyline::new(self.name[i].clone(), self.x[range.clone()].to_vec(), self.y[range].to_vec())
    }

    /// Iterate over all features
    pub fn features(&self) -> impl Iterator<Item = Polyline> + '_ {
        (0..self.len()).map(|i| self.feature(i))
    }
}

/// Even-odd ray casting test
pub fn point_in_polygon(x: f64, y: f64, poly: &Polyline) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (poly.x[i], poly.y[i]);
        let (xj, yj) = (poly.x[j], poly.y[j]);
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Shortest distance from `(x, y)` to the closed boundary of `poly`
pub fn distance_to_boundary(x: f64, y: f64, poly: &Polyline) -> f64 {
    let n = poly.len();
    let mut best = f64::INFINITY;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (ax, ay) = (poly.x[j], poly.y[j]);
        let (bx, by) = (poly.x[i], poly.y[i]);
        let (ex, ey) = (bx - ax, by - ay);
        let len2 = ex * ex + ey * ey;
        let t = if len2 > 0.0 {
            (((x - ax) * ex + (y - ay) * ey) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let (px, py) = (ax + t * ex, ay + t * ey);
        best = best.min(((x - px).powi(2) + (y - py).powi(2)).sqrt());
        j = i;
    }
    best
}

/// Rasterise a polygon: `value` in every cell whose centre is inside, 0 elsewhere.
///
/// Cell centres within `threshold * cellsize` of the boundary count as inside. The
/// polygon must be given in the same frame as `header`.
pub fn polygon_to_raster(header: &RasterHeader, poly: &Polyline, threshold: f64, value: f64) -> Raster {
    let mut raster = Raster::zeros(*header);
    if poly.len() < 3 {
        return raster;
    }
    let radius = threshold * header.cellsize;
    let (xmin, xmax, ymin, ymax) = poly.bounds();

    let col_range = cell_range(xmin - radius, xmax + radius, header.xllcenter, header.cellsize, header.ncols);
    let row_range = cell_range(ymin - radius, ymax + radius, header.yllcenter, header.cellsize, header.nrows);
    for row in row_range {
        for col in col_range.clone() {
            let (x, y) = header.cell_center(col, row);
            let inside = point_in_polygon(x, y, poly)
                || (radius > 0.0 && distance_to_boundary(x, y, poly) <= radius);
            if inside {
                raster.set(col, row, value);
            }
        }
    }
    raster
}

fn cell_range(lo: f64, hi: f64, origin: f64, cellsize: f64, n: usize) -> std::ops::Range<usize> {
    let first = ((lo - origin) / cellsize).floor().max(0.0) as usize;
    let last = (((hi - origin) / cellsize).ceil() as i64 + 1).clamp(0, n as i64) as usize;
    first.min(last)..last
}

/// Rasterise every feature of a layer onto the DEM grid.
///
/// # Arguments
///
/// * `lines` - Features in world coordinates
/// * `dem` - Target grid; features must lie inside its footprint
/// * `threshold` - Point-in-polygon tolerance in cell sizes (`thresholdPointInPoly`)
/// * `thickness` - Per-feature value written inside; `None` writes 1 (thickness provided
///   by a separate field)
/// * `layer` - Layer name used in error messages
/// * `combine` - Sum all features into a single raster
/// * `check_overlap` - Fail with [`AvaError::Overlap`] if two features share a cell
pub fn prepare_area(
    lines: &LineSet,
    dem: &Dem,
    threshold: f64,
    thickness: Option<&[f64]>,
    layer: &str,
    combine: bool,
    check_overlap: bool,
) -> AvaResult<Vec<Raster>> {
    if let Some(th) = thickness {
        if th.len() != lines.len() {
            return Err(AvaError::shape(format!("{layer} thickness"), lines.len(), th.len()));
        }
    }

    let (ox, oy) = dem.from_world(0.0, 0.0);
    let mut rasters = Vec::with_capacity(lines.len());
    for (i, feature) in lines.features().enumerate() {
        let local = feature.translated(ox, oy);
        dem.check_inside(&local.x, &local.y, &format!("{layer} feature '{}'", feature.name))?;
        let value = thickness.map_or(1.0, |th| th[i]);
        rasters.push(polygon_to_raster(dem.header(), &local, threshold, value));
    }

    if check_overlap {
        check_disjoint(&rasters, lines, layer)?;
    }
    debug!("Rasterised {} {} feature(s)", rasters.len(), layer);

    if combine && !rasters.is_empty() {
        let mut combined = Raster::zeros(*dem.header());
        for r in &rasters {
            for (c, v) in combined.data.iter_mut().zip(&r.data) {
                *c += v;
            }
        }
        return Ok(vec![combined]);
    }
    Ok(rasters)
}

fn check_disjoint(rasters: &[Raster], lines: &LineSet, layer: &str) -> AvaResult<()> {
    let Some(first) = rasters.first() else {
        return Ok(());
    };
    let mut owner: Vec<Option<usize>> = vec![None; first.data.len()];
    for (k, r) in rasters.iter().enumerate() {
        for (cell, &v) in r.data.iter().enumerate() {
            if v == 0.0 {
                continue;
            }
            if let Some(prev) = owner[cell] {
                return Err(AvaError::Overlap {
                    layer: layer.to_string(),
                    first: lines.name[prev].clone(),
                    second: lines.name[k].clone(),
                });
            }
            owner[cell] = Some(k);
        }
    }
    Ok(())
}
