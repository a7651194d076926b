//! Runout, area and mass metrics on the `(s, l)` grid
//!
//! Pressure fields enter in Pa and are analysed in kPa, so `thresholdValue` and
//! `maxPeakPressure` are in kPa.

use super::transform::PathTransform;
use crate::config::{AimecConfig, ResType};
use crate::error::{AvaError, AvaResult};
use crate::grid::dem::Dem;
use crate::grid::path::Profile;
use crate::grid::polygon::Polyline;
use crate::grid::raster::Raster;
use crate::simulation::mass_balance::MassBalance;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Maximum and mean of a transformed field across the path, per `s` sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathProfiles {
    /// Arc length of each row
    pub s: Vec<f64>,
    /// Largest finite value of each row (NaN for fully masked rows)
    pub max: Vec<f64>,
    /// Mean of the finite values of each row (NaN for fully masked rows)
    pub mean: Vec<f64>,
}

/// Max and mean profiles of an `(s, l)` raster
pub fn along_path_profiles(sl: &Raster, s: &[f64]) -> PathProfiles {
    let n_l = sl.header.ncols;
    let mut max = Vec::with_capacity(sl.header.nrows);
    let mut mean = Vec::with_capacity(sl.header.nrows);
    for row in sl.data.chunks(n_l) {
        let (mut m, mut sum, mut count) = (f64::NEG_INFINITY, 0.0, 0usize);
        for &v in row.iter().filter(|v| v.is_finite()) {
            m = m.max(v);
            sum += v;
            count += 1;
        }
        if count == 0 {
            max.push(f64::NAN);
            mean.push(f64::NAN);
        } else {
            max.push(m);
            mean.push(sum / count as f64);
        }
    }
    PathProfiles {
        s: s.to_vec(),
        max,
        mean,
    }
}

/// Values across the path at sample `k`
pub fn cross_profile(sl: &Raster, k: usize) -> &[f64] {
    let n_l = sl.header.ncols;
    &sl.data[k * n_l..(k + 1) * n_l]
}

/// Farthest point along the path where a field reaches the threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Runout {
    /// Path sample index
    pub index: usize,
    /// Arc length (m)
    pub s: f64,
    /// Elevation of the path at the runout (m)
    pub z: f64,
    /// Arc length of the first sample reaching the threshold (m)
    pub s_start: f64,
    /// Elevation of the path there (m)
    pub z_start: f64,
}

/// Runout of `profiles`; `None` if the threshold is never reached.
pub fn runout(profiles: &PathProfiles, path: &Profile, threshold: f64) -> Option<Runout> {
    let reached = |k: &usize| profiles.max[*k] >= threshold;
    let last = (0..profiles.max.len()).rev().find(reached)?;
    let first = (0..profiles.max.len()).find(reached)?;
    Some(Runout {
        index: last,
        s: path.s[last],
        z: path.z[last],
        s_start: path.s[first],
        z_start: path.z[first],
    })
}

/// Start of the runout area: first path sample from which the slope falls below `angle`
/// degrees.
///
/// Returns the sample index. Fails with [`AvaError::NoBetaFound`] if the path never gets
/// that flat.
pub fn start_of_runout_area(path: &Profile, angle: f64) -> AvaResult<usize> {
    (1..path.len())
        .find(|&k| path.segment_angle(k) < angle)
        .map(|k| k - 1)
        .ok_or_else(|| AvaError::NoBetaFound {
            profile: path.name.clone(),
        })
}

/// Contingency counts of a simulation against a reference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaMetrics {
    /// Affected in both
    pub true_positive: usize,
    /// Affected in the simulation only
    pub false_positive: usize,
    /// Affected in the reference only
    pub false_negative: usize,
    /// Affected in neither
    pub true_negative: usize,
}

impl AreaMetrics {
    /// `TP / (TP + FN)`
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    /// `FP / (FP + FN)`
    pub fn false_positive_ratio(&self) -> f64 {
        ratio(self.false_positive, self.false_positive + self.false_negative)
    }
}

fn ratio(a: usize, b: usize) -> f64 {
    if b == 0 {
        f64::NAN
    } else {
        a as f64 / b as f64
    }
}

fn check_same_shape(reference: &Raster, other: &Raster) -> AvaResult<()> {
    if reference.data.len() != other.data.len() {
        return Err(AvaError::shape(
            "transformed raster",
            reference.data.len(),
            other.data.len(),
        ));
    }
    Ok(())
}

/// Count cells by whether each field reaches `threshold`; masked cells are skipped.
pub fn area_metrics(reference: &Raster, other: &Raster, threshold: f64) -> AvaResult<AreaMetrics> {
    check_same_shape(reference, other)?;
    let mut m = AreaMetrics::default();
    for (&r, &o) in reference.data.iter().zip(&other.data) {
        if !(r.is_finite() && o.is_finite()) {
            continue;
        }
        match (r >= threshold, o >= threshold) {
            (true, true) => m.true_positive += 1,
            (false, true) => m.false_positive += 1,
            (true, false) => m.false_negative += 1,
            (false, false) => m.true_negative += 1,
        }
    }
    Ok(m)
}

/// Statistics of `other - reference` over cells where either is non-zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Largest difference
    pub max: f64,
    /// Smallest difference
    pub min: f64,
    /// Mean difference
    pub mean: f64,
}

/// Difference statistics; all NaN when both fields vanish everywhere
pub fn difference_stats(reference: &Raster, other: &Raster) -> AvaResult<DiffStats> {
    check_same_shape(reference, other)?;
    let mut stats = DiffStats {
        max: f64::NEG_INFINITY,
        min: f64::INFINITY,
        mean: 0.0,
    };
    let mut count = 0usize;
    for (&r, &o) in reference.data.iter().zip(&other.data) {
        if !(r.is_finite() && o.is_finite()) || (r == 0.0 && o == 0.0) {
            continue;
        }
        let d = o - r;
        stats.max = stats.max.max(d);
        stats.min = stats.min.min(d);
        stats.mean += d;
        count += 1;
    }
    if count == 0 {
        return Ok(DiffStats {
            max: f64::NAN,
            min: f64::NAN,
            mean: f64::NAN,
        });
    }
    stats.mean /= count as f64;
    Ok(stats)
}

/// Mass figures of one simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MassComparison {
    /// Released mass (kg)
    pub rel_mass: f64,
    /// Entrained mass (kg)
    pub ent_mass: f64,
    /// Final mass (kg)
    pub final_mass: f64,
    /// Relative final-mass difference to the reference
    pub relative_mass_diff: f64,
    /// `final / release`
    pub growth_index: f64,
    /// `(final - release) / duration` (kg/s)
    pub growth_grad: f64,
}

impl MassComparison {
    /// Compare `mass` with `reference`
    pub fn new(mass: &MassBalance, reference: &MassBalance) -> Self {
        Self {
            rel_mass: mass.release_mass,
            ent_mass: mass.entrained_mass(),
            final_mass: mass.final_mass(),
            relative_mass_diff: mass.relative_difference(reference),
            growth_index: mass.growth_index(),
            growth_grad: mass.growth_gradient(),
        }
    }

    fn missing() -> Self {
        Self {
            rel_mass: f64::NAN,
            ent_mass: f64::NAN,
            final_mass: f64::NAN,
            relative_mass_diff: f64::NAN,
            growth_index: f64::NAN,
            growth_grad: f64::NAN,
        }
    }
}

/// Peak fields and mass log of one simulation to analyse, rasters on the DEM grid
#[derive(Debug, Clone, Copy)]
pub struct AimecSimulation<'a> {
    /// Simulation name
    pub name: &'a str,
    /// Peak pressure (Pa)
    pub ppr: &'a Raster,
    /// Peak flow depth (m)
    pub pfd: &'a Raster,
    /// Peak flow velocity (m/s)
    pub pfv: &'a Raster,
    /// Mass log, when available
    pub mass: Option<&'a MassBalance>,
}

/// One row of the AIMEC results table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AimecRow {
    /// Position in the analysed list
    pub file_nr: usize,
    /// Simulation name
    pub sim_name: String,
    /// Runout point x (world)
    pub x_runout: f64,
    /// Runout point y (world)
    pub y_runout: f64,
    /// Arc length of the runout point (m)
    pub l_runout: f64,
    /// Runout measured from the start of the runout area (m)
    pub runout_from_sroa: f64,
    /// Elevation where the analysed field first reaches the threshold (m)
    pub elev_rel: f64,
    /// Drop between `elev_rel` and the runout point (m)
    pub delta_h: f64,
    /// kPa
    pub max_peak_pressure: f64,
    /// m
    pub max_peak_flow_depth: f64,
    /// m/s
    pub max_peak_velocity: f64,
    /// Mass figures
    #[serde(flatten)]
    pub mass: MassComparison,
    /// Area counts against the reference
    #[serde(flatten)]
    pub area: AreaMetrics,
    /// Field difference to the reference
    pub diff: DiffStats,
}

/// Outcome of [`analyse`]
#[derive(Debug, Clone)]
pub struct AimecReport {
    /// The path transform used
    pub transform: PathTransform,
    /// Path sample where the runout area starts
    pub sroa_index: usize,
    /// Index of the reference simulation
    pub reference: usize,
    /// One row per simulation
    pub rows: Vec<AimecRow>,
    /// Max/mean profiles of the analysed field per simulation
    pub profiles: Vec<PathProfiles>,
}

impl AimecReport {
    /// Arc length of the start of the runout area
    pub fn sroa_s(&self) -> f64 {
        self.transform.s()[self.sroa_index]
    }
}

/// Transform every simulation onto the path and compare it with `reference`.
///
/// # Arguments
/// * `dem` - Terrain the fields live on
/// * `path` - Avalanche path in world coordinates
/// * `cfg` - Domain width, threshold, SROA angle and analysed field
/// * `sims` - Simulations to analyse
/// * `reference` - Index into `sims` of the reference simulation
pub fn analyse(
    dem: &Dem,
    path: &Polyline,
    cfg: &AimecConfig,
    sims: &[AimecSimulation<'_>],
    reference: usize,
) -> AvaResult<AimecReport> {
    if !matches!(cfg.res_type, ResType::Ppr | ResType::Pfd | ResType::Pfv) {
        return Err(AvaError::config(
            "resType",
            format!("AIMEC analyses ppr, pfd or pfv, got {}", cfg.res_type.as_str()),
        ));
    }
    if reference >= sims.len() {
        return Err(AvaError::config(
            "reference",
            format!("index {reference} with {} simulation(s)", sims.len()),
        ));
    }

    let transform = PathTransform::new(dem, path, cfg)?;
    let sroa_index = start_of_runout_area(transform.profile(), cfg.start_of_runout_area_angle)?;
    let sroa_s = transform.s()[sroa_index];

    let analysed = |sim: &AimecSimulation<'_>| -> Raster {
        match cfg.res_type {
            ResType::Pfd => transform.transform(sim.pfd),
            ResType::Pfv => transform.transform(sim.pfv),
            _ => transform.transform(&sim.ppr.scaled(1e-3)),
        }
    };
    let fields: Vec<Raster> = sims.iter().map(analysed).collect();
    let reference_field = &fields[reference];
    let reference_mass = sims[reference].mass;

    let mut rows = Vec::with_capacity(sims.len());
    let mut profiles = Vec::with_capacity(sims.len());
    for (i, (sim, field)) in sims.iter().zip(&fields).enumerate() {
        let prof = along_path_profiles(field, transform.s());
        let run = runout(&prof, transform.profile(), cfg.threshold_value);
        let (x_runout, y_runout) = run.map_or((f64::NAN, f64::NAN), |r| {
            let p = transform.profile();
            dem.to_world(p.x[r.index], p.y[r.index])
        });
        let mass = match (sim.mass, reference_mass) {
            (Some(m), Some(r)) => MassComparison::new(m, r),
            _ => MassComparison::missing(),
        };
        let max_of = |r: &Raster| transform.transform(r).max_finite().unwrap_or(0.0);

        rows.push(AimecRow {
            file_nr: i,
            sim_name: sim.name.to_string(),
            x_runout,
            y_runout,
            l_runout: run.map_or(f64::NAN, |r| r.s),
            runout_from_sroa: run.map_or(f64::NAN, |r| r.s - sroa_s),
            elev_rel: run.map_or(f64::NAN, |r| r.z_start),
            delta_h: run.map_or(f64::NAN, |r| r.z_start - r.z),
            max_peak_pressure: max_of(sim.ppr) * 1e-3,
            max_peak_flow_depth: max_of(sim.pfd),
            max_peak_velocity: max_of(sim.pfv),
            mass,
            area: area_metrics(reference_field, field, cfg.threshold_value)?,
            diff: difference_stats(reference_field, field)?,
        });
        profiles.push(prof);
    }

    info!(
        "AIMEC on path '{}': {} simulation(s), runout area starts at s = {:.1} m",
        path.name,
        rows.len(),
        sroa_s
    );
    Ok(AimecReport {
        transform,
        sroa_index,
        reference,
        rows,
        profiles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::raster::RasterHeader;
    use approx::assert_relative_eq;

    fn sl_field(rows: &[&[f64]]) -> Raster {
        let ncols = rows[0].len();
        let header = RasterHeader::new(ncols, rows.len(), 1.0, 0.0, 0.0);
        Raster::from_data(header, rows.concat()).unwrap()
    }

    fn straight_profile(z: Vec<f64>) -> Profile {
        let n = z.len();
        Profile {
            name: "p".into(),
            x: (0..n).map(|k| k as f64 * 10.0).collect(),
            y: vec![0.0; n],
            s: (0..n).map(|k| k as f64 * 10.0).collect(),
            z,
            split_index: None,
        }
    }

    #[test]
    fn test_profiles_and_runout() {
        let field = sl_field(&[&[0.0, 2.0, 0.0], &[1.0, 5.0, 3.0], &[0.5, 0.2, f64::NAN], &[0.0, 0.0, 0.0]]);
        let path = straight_profile(vec![30.0, 20.0, 10.0, 5.0]);
        let prof = along_path_profiles(&field, &path.s);
        assert_relative_eq!(prof.max[1], 5.0);
        assert_relative_eq!(prof.mean[1], 3.0);
        assert_relative_eq!(prof.mean[2], 0.35);

        let run = runout(&prof, &path, 1.0).unwrap();
        assert_eq!(run.index, 1);
        assert_relative_eq!(run.s, 10.0);
        assert_relative_eq!(run.z_start, 30.0);
        assert!(runout(&prof, &path, 10.0).is_none());
        assert_eq!(cross_profile(&field, 1), &[1.0, 5.0, 3.0]);
    }

    #[test]
    fn test_start_of_runout_area() {
        // Segment drops: 10 m (45 deg), 10 m, 1 m (~5.7 deg)
        let path = straight_profile(vec![30.0, 20.0, 10.0, 9.0]);
        assert_eq!(start_of_runout_area(&path, 10.0).unwrap(), 2);
        assert!(matches!(
            start_of_runout_area(&path, 1.0),
            Err(AvaError::NoBetaFound { .. })
        ));
        let flat = straight_profile(vec![0.0; 4]);
        assert_eq!(start_of_runout_area(&flat, 10.0).unwrap(), 0);
    }

    #[test]
    fn test_area_metrics_and_differences() {
        let reference = sl_field(&[&[2.0, 2.0], &[0.0, 0.0]]);
        let other = sl_field(&[&[2.0, 0.0], &[3.0, f64::NAN]]);
        let m = area_metrics(&reference, &other, 1.0).unwrap();
        assert_eq!(
            m,
            AreaMetrics {
                true_positive: 1,
                false_positive: 1,
                false_negative: 1,
                true_negative: 0,
            }
        );
        assert_relative_eq!(m.hit_ratio(), 0.5);
        assert_relative_eq!(m.false_positive_ratio(), 0.5);

        let d = difference_stats(&reference, &other).unwrap();
        assert_relative_eq!(d.max, 3.0);
        assert_relative_eq!(d.min, -2.0);
        assert_relative_eq!(d.mean, 1.0 / 3.0);

        let wrong = sl_field(&[&[1.0]]);
        assert!(matches!(
            area_metrics(&reference, &wrong, 1.0),
            Err(AvaError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_analyse_self_comparison() {
        let dem = Dem::inclined_plane(60, 40, 5.0, 30.0, 5.0).unwrap();
        let header = *dem.header();
        // Deposit between x = 50 and 150 along the centre line, in Pa
        let ppr = Raster::from_fn(header, |x, y| {
            if (50.0..=150.0).contains(&x) && (y - 100.0).abs() <= 20.0 {
                5000.0
            } else {
                0.0
            }
        });
        let pfd = ppr.scaled(1e-3);
        let pfv = ppr.scaled(2e-3);
        let mut mass = MassBalance::new(1000.0);
        mass.push(1.0, 1000.0, 0.0);
        let sims = [AimecSimulation {
            name: "sim",
            ppr: &ppr,
            pfd: &pfd,
            pfv: &pfv,
            mass: Some(&mass),
        }];
        let path = Polyline::new("path", vec![20.0, 270.0], vec![100.0, 100.0]);
        let cfg = AimecConfig {
            domain_width: 60.0,
            start_of_runout_area_angle: 35.0,
            ..AimecConfig::default()
        };
        let report = analyse(&dem, &path, &cfg, &sims, 0).unwrap();
        let row = &report.rows[0];
        assert_relative_eq!(row.l_runout, 130.0, epsilon = 1e-9);
        assert_relative_eq!(row.x_runout, 150.0, epsilon = 1e-9);
        assert_relative_eq!(row.max_peak_pressure, 5.0, epsilon = 1e-9);
        assert_relative_eq!(row.max_peak_velocity, 10.0, epsilon = 1e-9);
        assert_eq!(row.area.false_positive + row.area.false_negative, 0);
        assert_relative_eq!(row.mass.relative_mass_diff, 0.0);
        assert_relative_eq!(row.mass.growth_index, 1.0);
        assert_eq!(report.sroa_index, 0);
        assert!(row.delta_h > 0.0);

        let steep = AimecConfig {
            start_of_runout_area_angle: 20.0,
            ..cfg
        };
        assert!(matches!(
            analyse(&dem, &path, &steep, &sims, 0),
            Err(AvaError::NoBetaFound { .. })
        ));
    }
}
