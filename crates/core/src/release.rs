//! Release, entrainment and resistance setup
//!
//! Turns rasterised feature layers into the initial particle population and the source
//! rasters the solver consumes:
//!
//! - release thickness raster -> particles, `ceil`/`round` of `m_cell / m_perPart` per cell
//! - entrainment flags -> entrainable mass per cell, `rho_ent h_ent A_cell flag`
//! - resistance flags -> drag coefficient per cell, `0.5 dRes cw / sres^2 flag`

use crate::config::{GeneralConfig, InitPartDistType, InputConfig, MassPerPartMethod};
use crate::error::{AvaError, AvaResult};
use crate::grid::dem::Dem;
use crate::grid::interpolation::InterpMethod;
use crate::grid::polygon::{prepare_area, LineSet};
use crate::grid::raster::Raster;
use crate::particles::{ParticleInit, Particles};
use rand::rngs::StdRng;
use rand::Rng;
use std::f64::consts::PI;
use tracing::info;

/// Target mass per particle (kg) for the configured determination method.
///
/// `max_thickness` is the largest release thickness, used by `MPPKR`.
pub fn mass_per_particle(cfg: &GeneralConfig, cellsize: f64, max_thickness: f64) -> f64 {
    match cfg.mass_per_particle_determination_method {
        MassPerPartMethod::Direct => cfg.mass_per_part,
        MassPerPartMethod::DeltaThickness => cfg.rho * cellsize * cellsize * cfg.delta_th,
        MassPerPartMethod::KernelRadius => {
            let r = cfg.sph_kernel_radius;
            cfg.rho * PI * r * r * max_thickness / cfg.n_ppk0
        }
    }
}

/// Release thickness raster of `lines`.
///
/// Each feature carries its own thickness when `relThFromShp` is set and the feature has
/// one; otherwise `default_thickness` (`relTh` or `secRelTh`) applies. Features must not
/// overlap.
pub fn release_thickness(
    lines: &LineSet,
    dem: &Dem,
    input: &InputConfig,
    default_thickness: f64,
    layer: &str,
) -> AvaResult<Raster> {
    let thickness: Vec<f64> = (0..lines.len())
        .map(|i| {
            lines.thickness[i]
                .filter(|_| input.rel_th_from_shp)
                .unwrap_or(default_thickness)
        })
        .collect();
    if let Some(bad) = thickness.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
        return Err(AvaError::config("relTh", format!("{layer} thickness must be positive, got {bad}")));
    }
    let mut rasters = prepare_area(
        lines,
        dem,
        input.threshold_point_in_poly,
        Some(&thickness),
        layer,
        true,
        true,
    )?;
    Ok(rasters.pop().unwrap_or_else(|| Raster::zeros(*dem.header())))
}

/// Flag raster (1 inside any feature) of an entrainment or resistance layer
pub fn feature_flags(lines: &LineSet, dem: &Dem, threshold: f64, layer: &str) -> AvaResult<Raster> {
    let mut rasters = prepare_area(lines, dem, threshold, None, layer, true, true)?;
    Ok(rasters.pop().unwrap_or_else(|| Raster::zeros(*dem.header())))
}

/// Entrainable mass per cell (kg)
pub fn entrainment_mass(dem: &Dem, flags: &Raster, rho_ent: f64, h_ent: f64) -> AvaResult<Raster> {
    let area = dem.area();
    if flags.data.len() != area.data.len() {
        return Err(AvaError::shape("entrainment flags", area.data.len(), flags.data.len()));
    }
    let data = flags
        .data
        .iter()
        .zip(&area.data)
        .map(|(&flag, &a)| {
            if flag > 0.0 && a.is_finite() {
                rho_ent * h_ent * a * flag
            } else {
                0.0
            }
        })
        .collect();
    Raster::from_data(*dem.header(), data)
}

/// Resistance coefficient per cell
pub fn resistance_coefficients(flags: &Raster, d_res: f64, cw: f64, sres: f64) -> Raster {
    let c = 0.5 * d_res * cw / (sres * sres);
    Raster {
        header: flags.header,
        data: flags.data.iter().map(|&f| if f > 0.0 { c * f } else { 0.0 }).collect(),
    }
}

/// Seed particles in every cell of `thickness` with a positive value.
///
/// Particle masses are renormalised so that their sum equals the rasterised release mass
/// `sum(rel * A_cell * rho)` exactly. Each particle starts at rest with depth equal to its
/// cell's release thickness and area `A_cell / n`.
///
/// # Arguments
///
/// * `dem` - Terrain; no-data cells are skipped
/// * `thickness` - Release thickness per cell (m)
/// * `cfg` - Density, seeding method and mass-per-particle settings
/// * `mass_per_part` - Target mass per particle (kg)
/// * `rng` - Random source for the jittered placements
/// * `t` - Time stamp of the new population
pub fn initialise_particles(
    dem: &Dem,
    thickness: &Raster,
    cfg: &GeneralConfig,
    mass_per_part: f64,
    rng: &mut StdRng,
    t: f64,
) -> AvaResult<Particles> {
    let header = *dem.header();
    if thickness.data.len() != header.len() {
        return Err(AvaError::shape("release thickness", header.len(), thickness.data.len()));
    }
    if !(mass_per_part.is_finite() && mass_per_part > 0.0) {
        return Err(AvaError::config(
            "massPerPart",
            format!("must be finite and positive, got {mass_per_part}"),
        ));
    }

    let area = dem.area();
    let cs = header.cellsize;
    let mut particles = Particles::new(t);
    let mut release_mass = 0.0;

    for row in 0..header.nrows {
        for col in 0..header.ncols {
            let idx = header.index(col, row);
            let rel = thickness.data[idx];
            if !(rel > 0.0) || dem.is_outside(idx) {
                continue;
            }
            let a_cell = area.data[idx];
            let m_cell = rel * a_cell * cfg.rho;
            release_mass += m_cell;

            let n_real = m_cell / mass_per_part;
            let n = match (cfg.init_part_dist_type, cfg.mass_per_particle_determination_method) {
                (InitPartDistType::Random, MassPerPartMethod::DeltaThickness) => {
                    let whole = n_real.floor();
                    let extra = usize::from(rng.random_bool((n_real - whole).clamp(0.0, 1.0)));
                    whole as usize + extra
                }
                _ => n_real.round() as usize,
            }
            .max(1);

            let (cx, cy) = header.cell_center(col, row);
            let offsets = place_in_cell(cfg.init_part_dist_type, n, cs, rng);
            let count = offsets.len() as f64;
            for (ox, oy) in offsets {
                let (x, y) = (cx + ox, cy + oy);
                let z = dem
                    .elevation_at(x, y, InterpMethod::Bilinear)
                    .unwrap_or(dem.elevation().data[idx]);
                particles.push(&ParticleInit {
                    x,
                    y,
                    z,
                    m: m_cell / count,
                    a: a_cell / count,
                    h: rel,
                });
            }
        }
    }

    let seeded: f64 = particles.m.iter().sum();
    if seeded > 0.0 {
        let scale = release_mass / seeded;
        for m in &mut particles.m {
            *m *= scale;
        }
    }
    particles.update_mass_total();
    info!(
        "Seeded {} particles, release mass {:.1} kg ({:.1} kg per particle target)",
        particles.n, particles.m_tot, mass_per_part
    );
    Ok(particles)
}

/// Offsets from the cell centre for `n` particles in a cell of size `cs`.
///
/// Uniform and semi-random placements use a `k x k` sub-grid with `k = ceil(sqrt(n))`,
/// so they may place more than `n` particles.
fn place_in_cell(dist: InitPartDistType, n: usize, cs: f64, rng: &mut StdRng) -> Vec<(f64, f64)> {
    match dist {
        InitPartDistType::Random => (0..n)
            .map(|_| {
                (
                    rng.random_range(-0.5 * cs..0.5 * cs),
                    rng.random_range(-0.5 * cs..0.5 * cs),
                )
            })
            .collect(),
        InitPartDistType::Uniform | InitPartDistType::Semirandom => {
            let k = (n as f64).sqrt().ceil().max(1.0) as usize;
            let spacing = cs / k as f64;
            let jitter = dist == InitPartDistType::Semirandom;
            let mut out = Vec::with_capacity(k * k);
            for j in 0..k {
                for i in 0..k {
                    let mut ox = (i as f64 + 0.5) * spacing - 0.5 * cs;
                    let mut oy = (j as f64 + 0.5) * spacing - 0.5 * cs;
                    if jitter {
                        ox += rng.random_range(-0.5 * spacing..0.5 * spacing);
                        oy += rng.random_range(-0.5 * spacing..0.5 * spacing);
                    }
                    out.push((ox, oy));
                }
            }
            out
        }
    }
}
