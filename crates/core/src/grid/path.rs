//! Path profiles and path-following domains
//!
//! A [`Profile`] is a polyline resampled at a bounded horizontal spacing, with elevations
//! projected from the DEM and cumulative horizontal arc length `s`. Profiles live in DEM
//! (origin-shifted) coordinates.

use super::dem::Dem;
use super::interpolation::{project_on_raster, InterpMethod};
use super::polygon::Polyline;
use crate::error::{AvaError, AvaResult};
use serde::{Deserialize, Serialize};

/// Resampled path with elevation and arc length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Name of the source polyline
    pub name: String,
    /// Sample x coordinates
    pub x: Vec<f64>,
    /// Sample y coordinates
    pub y: Vec<f64>,
    /// Elevation of each sample
    pub z: Vec<f64>,
    /// Cumulative horizontal arc length
    pub s: Vec<f64>,
    /// Index of the sample closest to the split point, if one was given
    pub split_index: Option<usize>,
}

impl Profile {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Total horizontal length
    pub fn length(&self) -> f64 {
        self.s.last().copied().unwrap_or(0.0)
    }

    /// Slope angle in degrees of the segment ending at sample `k` (`k >= 1`).
    ///
    /// Positive when the path descends.
    pub fn segment_angle(&self, k: usize) -> f64 {
        let ds = self.s[k] - self.s[k - 1];
        let dz = self.z[k - 1] - self.z[k];
        if ds > 0.0 {
            (dz / ds).atan().to_degrees()
        } else {
            0.0
        }
    }
}

/// Cumulative horizontal arc length of a polyline
pub fn arc_length(x: &[f64], y: &[f64]) -> Vec<f64> {
    let mut s = Vec::with_capacity(x.len());
    let mut acc = 0.0;
    for k in 0..x.len() {
        if k > 0 {
            acc += (x[k] - x[k - 1]).hypot(y[k] - y[k - 1]);
        }
        s.push(acc);
    }
    s
}

/// Insert points so that consecutive samples are at most `spacing` apart horizontally.
///
/// Original vertices are kept; each segment is split into equal parts.
pub fn resample_polyline(x: &[f64], y: &[f64], spacing: f64) -> (Vec<f64>, Vec<f64>) {
    let mut rx = Vec::new();
    let mut ry = Vec::new();
    if x.is_empty() {
        return (rx, ry);
    }
    for k in 0..x.len() - 1 {
        let (dx, dy) = (x[k + 1] - x[k], y[k + 1] - y[k]);
        let n = ((dx.hypot(dy) / spacing).ceil() as usize).max(1);
        for j in 0..n {
            let t = j as f64 / n as f64;
            rx.push(x[k] + t * dx);
            ry.push(y[k] + t * dy);
        }
    }
    rx.push(x[x.len() - 1]);
    ry.push(y[y.len() - 1]);
    (rx, ry)
}

/// Resample `line` (world coordinates) and project it onto the DEM.
///
/// # Arguments
///
/// * `dem` - Terrain providing elevations
/// * `line` - Path in world coordinates, at least two vertices
/// * `spacing` - Maximum horizontal distance between samples
/// * `split_point` - Optional world point whose nearest sample index is recorded
///
/// # Returns
///
/// Profile in DEM coordinates, or [`AvaError::OutOfDem`] if the path or the split point
/// leaves the DEM
pub fn prepare_line(
    dem: &Dem,
    line: &Polyline,
    spacing: f64,
    split_point: Option<(f64, f64)>,
) -> AvaResult<Profile> {
    if line.len() < 2 || line.x.len() != line.y.len() {
        return Err(AvaError::config(
            "path",
            format!("line '{}' needs at least two vertices", line.name),
        ));
    }
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(AvaError::config("spacing", format!("must be positive, got {spacing}")));
    }

    let (ox, oy) = dem.from_world(0.0, 0.0);
    let local = line.translated(ox, oy);
    dem.check_inside(&local.x, &local.y, &format!("line '{}'", line.name))?;

    let (x, y) = resample_polyline(&local.x, &local.y, spacing);
    let (z, n_out) = project_on_raster(&x, &y, dem.elevation(), InterpMethod::Bilinear);
    if n_out > 0 || z.iter().any(|v| !v.is_finite()) {
        return Err(AvaError::out_of_dem(format!("line '{}' (no-data crossing)", line.name)));
    }
    let s = arc_length(&x, &y);

    let split_index = match split_point {
        Some((sx, sy)) => {
            let (sx, sy) = dem.from_world(sx, sy);
            dem.check_inside(&[sx], &[sy], &format!("split point of '{}'", line.name))?;
            nearest_index(&x, &y, sx, sy)
        }
        None => None,
    };

    Ok(Profile {
        name: line.name.clone(),
        x,
        y,
        z,
        s,
        split_index,
    })
}

fn nearest_index(x: &[f64], y: &[f64], px: f64, py: f64) -> Option<usize> {
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| (xi - px).powi(2) + (yi - py).powi(2))
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Make the profile run downhill; reverses in place when the end is higher than the start.
///
/// Returns `true` if the profile was reversed. Arc length is recomputed and the split index
/// is mirrored.
pub fn check_profile(profile: &mut Profile) -> bool {
    let (Some(&first), Some(&last)) = (profile.z.first(), profile.z.last()) else {
        return false;
    };
    if first >= last {
        return false;
    }
    profile.x.reverse();
    profile.y.reverse();
    profile.z.reverse();
    profile.s = arc_length(&profile.x, &profile.y);
    let n = profile.len();
    profile.split_index = profile.split_index.map(|i| n - 1 - i);
    true
}

/// Path with per-vertex bisector normals and parallel left/right boundaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathDomain {
    /// Path x coordinates
    pub x: Vec<f64>,
    /// Path y coordinates
    pub y: Vec<f64>,
    /// Unit normal x component (pointing left of the travel direction)
    pub normal_x: Vec<f64>,
    /// Unit normal y component
    pub normal_y: Vec<f64>,
    /// Left boundary x
    pub left_x: Vec<f64>,
    /// Left boundary y
    pub left_y: Vec<f64>,
    /// Right boundary x
    pub right_x: Vec<f64>,
    /// Right boundary y
    pub right_y: Vec<f64>,
    /// Distance from path to each boundary
    pub half_width: f64,
}

/// Build the domain of width `domain_width` around a path.
///
/// The half width is rounded up to a whole number of cells so that the lateral samples
/// `l = -half_width, ..., +half_width` at spacing `cellsize` are symmetric about the path.
pub fn path_to_domain(x: &[f64], y: &[f64], domain_width: f64, cellsize: f64) -> AvaResult<PathDomain> {
    if x.len() < 2 {
        return Err(AvaError::config("path", "needs at least two vertices"));
    }
    if !(domain_width.is_finite() && domain_width > 0.0) {
        return Err(AvaError::config(
            "domainWidth",
            format!("must be positive, got {domain_width}"),
        ));
    }
    let half_width = (domain_width / 2.0 / cellsize).ceil() * cellsize;

    let n = x.len();
    let seg_dir = |k: usize| -> (f64, f64) {
        let (dx, dy) = (x[k + 1] - x[k], y[k + 1] - y[k]);
        let len = dx.hypot(dy);
        if len > 0.0 {
            (dx / len, dy / len)
        } else {
            (0.0, 0.0)
        }
    };

    let mut domain = PathDomain {
        x: x.to_vec(),
        y: y.to_vec(),
        normal_x: Vec::with_capacity(n),
        normal_y: Vec::with_capacity(n),
        left_x: Vec::with_capacity(n),
        left_y: Vec::with_capacity(n),
        right_x: Vec::with_capacity(n),
        right_y: Vec::with_capacity(n),
        half_width,
    };
    let mut previous = (0.0, 1.0);
    for k in 0..n {
        let before = if k > 0 { seg_dir(k - 1) } else { (0.0, 0.0) };
        let after = if k + 1 < n { seg_dir(k) } else { (0.0, 0.0) };
        let (tx, ty) = (before.0 + after.0, before.1 + after.1);
        let len = tx.hypot(ty);
        // Degenerate tangents (duplicate vertices, full reversal) reuse the previous normal
        let normal = if len > 1e-12 {
            (-ty / len, tx / len)
        } else {
            previous
        };
        previous = normal;

        domain.normal_x.push(normal.0);
        domain.normal_y.push(normal.1);
        domain.left_x.push(x[k] + half_width * normal.0);
        domain.left_y.push(y[k] + half_width * normal.1);
        domain.right_x.push(x[k] - half_width * normal.0);
        domain.right_y.push(y[k] - half_width * normal.1);
    }
    Ok(domain)
}
