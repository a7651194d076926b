//! Result writers
//!
//! File names:
//! - peak rasters: `<sim>_<resType>_t<time>.asc` at save times, `<sim>_<resType>.asc` for
//!   the final step; pressures in kPa
//! - mass log: `mass_<sim>.txt` with header `time, current, entrained`
//! - particles: `particles_<sim>_<time>.json`, optional `.csv` with selected columns
//! - AIMEC: `Results_<project>_<resType>_<threshold>_w_<width>.txt`

use crate::ascii_grid::write_ascii_grid;
use avaframe_core::aimec::AimecRow;
use avaframe_core::config::{AimecConfig, ResType};
use avaframe_core::error::{AvaError, AvaResult};
use avaframe_core::grid::dem::Dem;
use avaframe_core::grid::raster::Raster;
use avaframe_core::particles::Particles;
use avaframe_core::simulation::{MassBalance, Snapshot};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Time stamp used in file names
fn time_tag(time: f64) -> String {
    let rounded = (time * 100.0).round() / 100.0;
    format!("{rounded}")
}

/// `<sim>_<res>_t<time>.asc`, or `<sim>_<res>.asc` for the final fields
pub fn peak_file_name(sim: &str, res: ResType, time: Option<f64>) -> String {
    match time {
        Some(t) => format!("{sim}_{res}_t{}.asc", time_tag(t)),
        None => format!("{sim}_{res}.asc"),
    }
}

/// Write one result field, shifted to world coordinates; pressures are converted to kPa.
pub fn write_peak_field(
    dir: &Path,
    dem: &Dem,
    sim: &str,
    res: ResType,
    time: Option<f64>,
    field: &Raster,
) -> AvaResult<PathBuf> {
    let path = dir.join(peak_file_name(sim, res, time));
    let mut world = dem.to_world_raster(field);
    if res == ResType::Ppr {
        world = world.scaled(1e-3);
    }
    write_ascii_grid(&path, &world)?;
    debug!("Wrote {}", path.display());
    Ok(path)
}

/// Write every field of a snapshot.
///
/// The final snapshot is written under both the time-stamped and the plain name.
pub fn write_snapshot_fields(dir: &Path, dem: &Dem, sim: &str, snapshot: &Snapshot) -> AvaResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (res, field) in &snapshot.fields {
        written.push(write_peak_field(dir, dem, sim, *res, Some(snapshot.time), field)?);
        if snapshot.is_final {
            written.push(write_peak_field(dir, dem, sim, *res, None, field)?);
        }
    }
    Ok(written)
}

/// `mass_<sim>.txt`
pub fn mass_file_name(sim: &str) -> String {
    format!("mass_{sim}.txt")
}

/// Write the mass log, one line per step.
///
/// The first line holds the release mass at `t = 0`.
pub fn write_mass_log(dir: &Path, sim: &str, mass: &MassBalance) -> AvaResult<PathBuf> {
    let mut out = String::from("time, current, entrained\n");
    let _ = writeln!(out, "0, {}, 0", mass.release_mass);
    for e in &mass.entries {
        let _ = writeln!(out, "{}, {}, {}", e.time, e.current, e.entrained);
    }
    let path = dir.join(mass_file_name(sim));
    fs::write(&path, out)?;
    Ok(path)
}

/// Read a mass log written by [`write_mass_log`]
pub fn read_mass_log(path: &Path) -> AvaResult<MassBalance> {
    let content = fs::read_to_string(path)?;
    let bad = |line: usize, message: &str| AvaError::InputFormat {
        path: path.to_path_buf(),
        message: format!("line {line}: {message}"),
    };
    let mut rows = Vec::new();
    for (i, line) in content.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let values: Vec<f64> = line
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| bad(i + 1, "non-numeric value"))?;
        let &[time, current, entrained] = values.as_slice() else {
            return Err(bad(i + 1, "expected 3 columns"));
        };
        rows.push((time, current, entrained));
    }
    let Some(&(_, release, _)) = rows.first() else {
        return Err(bad(1, "no data"));
    };
    let mut mass = MassBalance::new(release);
    for &(time, current, entrained) in &rows[1..] {
        mass.push(time, current, entrained);
    }
    Ok(mass)
}

/// Particle snapshot as JSON: `particles_<sim>_<time>.json`
pub fn write_particles_json(dir: &Path, sim: &str, particles: &Particles) -> AvaResult<PathBuf> {
    let path = dir.join(format!("particles_{sim}_{}.json", time_tag(particles.t)));
    let json = serde_json::to_string(particles).map_err(|e| AvaError::InputFormat {
        path: path.clone(),
        message: e.to_string(),
    })?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Read a particle snapshot written by [`write_particles_json`]
pub fn read_particles_json(path: &Path) -> AvaResult<Particles> {
    let content = fs::read_to_string(path)?;
    let particles: Particles = serde_json::from_str(&content).map_err(|e| AvaError::InputFormat {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    particles.check()?;
    Ok(particles)
}

/// Column of the particle CSV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleColumn {
    /// Mass
    M,
    /// World x
    X,
    /// World y
    Y,
    /// Elevation
    Z,
    /// Velocity x
    Ux,
    /// Velocity y
    Uy,
    /// Velocity z
    Uz,
    /// Speed
    VelocityMagnitude,
    /// Flow depth
    H,
    /// Travelled distance
    S,
    /// Travel angle (degrees)
    TravelAngle,
    /// Identifier
    Id,
}

impl ParticleColumn {
    /// Parse a `particleProperties` entry
    pub fn parse(name: &str) -> AvaResult<Self> {
        Ok(match name {
            "m" => Self::M,
            "x" => Self::X,
            "y" => Self::Y,
            "z" => Self::Z,
            "ux" => Self::Ux,
            "uy" => Self::Uy,
            "uz" => Self::Uz,
            "velocityMagnitude" => Self::VelocityMagnitude,
            "h" => Self::H,
            "s" => Self::S,
            "travelAngle" => Self::TravelAngle,
            "id" => Self::Id,
            other => {
                return Err(AvaError::config(
                    "particleProperties",
                    format!("unknown particle property '{other}'"),
                ))
            }
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::M => "m",
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
            Self::Ux => "ux",
            Self::Uy => "uy",
            Self::Uz => "uz",
            Self::VelocityMagnitude => "velocityMagnitude",
            Self::H => "h",
            Self::S => "s",
            Self::TravelAngle => "travelAngle",
            Self::Id => "id",
        }
    }

    fn value(self, p: &Particles, dem: &Dem, i: usize) -> f64 {
        match self {
            Self::M => p.m[i],
            Self::X => dem.to_world(p.x[i], p.y[i]).0,
            Self::Y => dem.to_world(p.x[i], p.y[i]).1,
            Self::Z => p.z[i],
            Self::Ux => p.ux[i],
            Self::Uy => p.uy[i],
            Self::Uz => p.uz[i],
            Self::VelocityMagnitude => p.velocity_magnitude(i),
            Self::H => p.h[i],
            Self::S => p.s[i],
            Self::TravelAngle => p.travel_angle(i),
            Self::Id => p.id[i] as f64,
        }
    }
}

/// Particle snapshot as CSV with the selected columns, positions in world coordinates
pub fn write_particles_csv(
    dir: &Path,
    dem: &Dem,
    sim: &str,
    particles: &Particles,
    properties: &[String],
) -> AvaResult<PathBuf> {
    let columns: Vec<ParticleColumn> = properties
        .iter()
        .map(|p| ParticleColumn::parse(p))
        .collect::<AvaResult<_>>()?;
    let mut out = columns.iter().map(|c| c.name()).collect::<Vec<_>>().join(",");
    out.push('\n');
    for i in 0..particles.len() {
        let row: Vec<String> = columns
            .iter()
            .map(|c| c.value(particles, dem, i).to_string())
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    let path = dir.join(format!("particles_{sim}_{}.csv", time_tag(particles.t)));
    fs::write(&path, out)?;
    Ok(path)
}

/// `Results_<project>_<resType>_<threshold>_w_<width>.txt`
pub fn aimec_file_name(project: &str, cfg: &AimecConfig) -> String {
    format!(
        "Results_{project}_{}_{}_w_{}.txt",
        cfg.res_type, cfg.threshold_value, cfg.domain_width
    )
}

const AIMEC_COLUMNS: [&str; 20] = [
    "fileNr",
    "Xrunout",
    "Yrunout",
    "Lrunout",
    "runoutFromSROA",
    "elevRel",
    "deltaH",
    "maxPeakPressure",
    "maxPeakFlowDepth",
    "maxPeakVelocity",
    "relMass",
    "entMass",
    "finalMass",
    "relativMassDiff",
    "growthIndex",
    "growthGrad",
    "TP",
    "FN",
    "FP",
    "TN",
];

/// Write the AIMEC results table, one whitespace-separated row per simulation
pub fn write_aimec_table(dir: &Path, project: &str, cfg: &AimecConfig, rows: &[AimecRow]) -> AvaResult<PathBuf> {
    let mut out = AIMEC_COLUMNS.join("\t");
    out.push_str("\tsimName\n");
    for r in rows {
        let values = [
            r.x_runout,
            r.y_runout,
            r.l_runout,
            r.runout_from_sroa,
            r.elev_rel,
            r.delta_h,
            r.max_peak_pressure,
            r.max_peak_flow_depth,
            r.max_peak_velocity,
            r.mass.rel_mass,
            r.mass.ent_mass,
            r.mass.final_mass,
            r.mass.relative_mass_diff,
            r.mass.growth_index,
            r.mass.growth_grad,
        ];
        let _ = write!(out, "{}", r.file_nr);
        for v in values {
            let _ = write!(out, "\t{v:.4}");
        }
        let _ = writeln!(
            out,
            "\t{}\t{}\t{}\t{}\t{}",
            r.area.true_positive, r.area.false_negative, r.area.false_positive, r.area.true_negative, r.sim_name
        );
    }
    let path = dir.join(aimec_file_name(project, cfg));
    fs::write(&path, out)?;
    info!("AIMEC results written to {}", path.display());
    Ok(path)
}
