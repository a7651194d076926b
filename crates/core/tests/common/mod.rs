//! Shared setup for the scenario tests
#![allow(dead_code)]

use avaframe_core::config::{FrictModel, GeneralConfig, InitPartDistType, MassPerPartMethod, SimulationConfig};
use avaframe_core::grid::dem::Dem;
use avaframe_core::grid::raster::Raster;
use avaframe_core::simulation::{DfaSimulation, SimulationContext, SimulationInputs, SimulationResult};
use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Coulomb friction, fixed time step, uniform seeding
pub fn scenario_config(t_end: f64) -> SimulationConfig {
    SimulationConfig {
        general: GeneralConfig {
            frict_model: FrictModel::Coulomb,
            mu: 0.155,
            t_end,
            dt: 0.1,
            dt_save: 0.0,
            mass_per_part: 1250.0,
            mass_per_particle_determination_method: MassPerPartMethod::Direct,
            init_part_dist_type: InitPartDistType::Uniform,
            stop_crit: 0.0,
            ..GeneralConfig::default()
        },
        ..SimulationConfig::default()
    }
}

/// 1 m thick rectangle `[x0, x1] x [y0, y1]` on the DEM grid
pub fn rectangle_release(dem: &Dem, x0: f64, x1: f64, y0: f64, y1: f64) -> Raster {
    Raster::from_fn(*dem.header(), |x, y| {
        if (x0..=x1).contains(&x) && (y0..=y1).contains(&y) {
            1.0
        } else {
            0.0
        }
    })
}

/// Run one simulation to completion
pub fn run(dem: &Dem, cfg: &SimulationConfig, inputs: SimulationInputs) -> SimulationResult {
    let mut ctx = SimulationContext::new(cfg.general.seed);
    DfaSimulation::new("scenario", dem, cfg)
        .run(inputs, &mut ctx)
        .unwrap()
        .0
}

/// Mass-weighted centre of the particle cloud
pub fn centroid(result: &SimulationResult) -> (f64, f64) {
    let p = &result.particles;
    let (mut x, mut y) = (0.0, 0.0);
    for i in 0..p.n {
        x += p.m[i] * p.x[i];
        y += p.m[i] * p.y[i];
    }
    (x / p.m_tot, y / p.m_tot)
}
