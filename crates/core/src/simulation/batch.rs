//! Batch orchestration over release scenarios, simulation types and parameter values
//!
//! Every combination becomes one simulation named `<release>_<hash>_<simType>_dfa`, where
//! `hash` identifies the effective configuration. Per-simulation failures
//! ([`AvaError::is_per_simulation`]) are recorded and the batch continues; any other error
//! aborts it.

use super::context::SimulationContext;
use super::run::{DfaSimulation, SecondaryRelease, SimulationInputs, SimulationResult, Snapshot};
use crate::config::{SimType, SimulationConfig};
use crate::error::{AvaError, AvaResult};
use crate::grid::dem::Dem;
use crate::grid::polygon::LineSet;
use crate::release::{entrainment_mass, feature_flags, release_thickness, resistance_coefficients};
use rustc_hash::{FxHashSet, FxHasher};
use std::borrow::Cow;
use std::hash::Hasher;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

/// One named release scenario
#[derive(Debug, Clone)]
pub struct ReleaseScenario {
    /// Scenario name (release file stem)
    pub name: String,
    /// Release features
    pub lines: LineSet,
}

/// Terrain and feature layers shared by every simulation of a batch
#[derive(Debug, Clone)]
pub struct BatchInputs {
    /// Terrain
    pub dem: Dem,
    /// Release scenarios
    pub releases: Vec<ReleaseScenario>,
    /// Secondary release features
    pub secondary: Option<LineSet>,
    /// Entrainment features
    pub entrainment: Option<LineSet>,
    /// Resistance features
    pub resistance: Option<LineSet>,
}

/// A simulation of the batch that failed without aborting it
#[derive(Debug)]
pub struct FailedSimulation {
    /// Simulation name
    pub name: String,
    /// What went wrong
    pub error: AvaError,
}

/// Outcome of a batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Completed simulations in run order
    pub results: Vec<SimulationResult>,
    /// Simulations that failed
    pub failures: Vec<FailedSimulation>,
}

/// Planned simulation: name plus effective configuration
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    /// `<release>_<hash>_<simType>_dfa`
    pub name: String,
    /// Index into [`BatchInputs::releases`]
    pub release: usize,
    /// Resolved simulation type
    pub sim_type: SimType,
    /// Configuration with the parameter variation applied
    pub config: SimulationConfig,
}

/// Short stable hash of a configuration
pub fn config_hash(cfg: &SimulationConfig) -> AvaResult<String> {
    let bytes = serde_json::to_vec(cfg)
        .map_err(|e| AvaError::config("configuration", format!("cannot serialise: {e}")))?;
    let mut hasher = FxHasher::default();
    hasher.write(&bytes);
    let hex = format!("{:016x}", hasher.finish());
    Ok(hex[..10].to_string())
}

/// Simulation name for a release, configuration hash and type
pub fn simulation_name(release: &str, hash: &str, sim_type: SimType) -> String {
    format!("{release}_{hash}_{sim_type}_dfa")
}

/// Expand releases x simulation types x parameter values into named plans.
///
/// Duplicate names (identical effective configurations) are planned once.
pub fn plan_simulations(inputs: &BatchInputs, cfg: &SimulationConfig) -> AvaResult<Vec<SimulationPlan>> {
    cfg.validate()?;
    let has_ent = inputs.entrainment.is_some();
    let has_res = inputs.resistance.is_some();

    let variants: Vec<SimulationConfig> = match &cfg.parameter_var {
        None => vec![cfg.clone()],
        Some(var) => var
            .values
            .iter()
            .map(|&v| {
                let mut c = cfg.clone();
                c.general.set_parameter(&var.parameter, v)?;
                c.parameter_var = None;
                c.validate()?;
                Ok(c)
            })
            .collect::<AvaResult<_>>()?,
    };

    let mut seen = FxHashSet::default();
    let mut plans = Vec::new();
    for (ri, release) in inputs.releases.iter().enumerate() {
        if cfg
            .input
            .release_scenario
            .as_ref()
            .is_some_and(|wanted| *wanted != release.name)
        {
            continue;
        }
        for requested in &cfg.general.sim_type_list {
            let sim_type = requested.resolve(has_ent, has_res);
            if (sim_type.entrainment() && !has_ent) || (sim_type.resistance() && !has_res) {
                warn!(
                    "Skipping {} for release {}: required input layer missing",
                    sim_type, release.name
                );
                continue;
            }
            for variant in &variants {
                let name = simulation_name(&release.name, &config_hash(variant)?, sim_type);
                if !seen.insert(name.clone()) {
                    continue;
                }
                plans.push(SimulationPlan {
                    name,
                    release: ri,
                    sim_type,
                    config: variant.clone(),
                });
            }
        }
    }
    if plans.is_empty() {
        return Err(AvaError::config(
            "releaseScenario",
            "no release scenario matches the configuration",
        ));
    }
    Ok(plans)
}

/// Rasterise the layers a plan needs
pub fn prepare_inputs(inputs: &BatchInputs, dem: &Dem, plan: &SimulationPlan) -> AvaResult<SimulationInputs> {
    let cfg = &plan.config;
    let general = &cfg.general;
    let threshold = cfg.input.threshold_point_in_poly;
    let release = release_thickness(
        &inputs.releases[plan.release].lines,
        dem,
        &cfg.input,
        general.rel_th,
        "release",
    )?;

    let mut secondary = Vec::new();
    if cfg.input.sec_rel_area {
        if let Some(lines) = &inputs.secondary {
            for (i, feature) in lines.features().enumerate() {
                let single = LineSet::from_polylines(&[feature.clone()], &[lines.thickness[i]])?;
                let th = release_thickness(&single, dem, &cfg.input, general.sec_rel_th, "secondary release")?;
                secondary.push(SecondaryRelease::new(feature.name, th));
            }
        }
    }

    let entrainment = match (&inputs.entrainment, plan.sim_type.entrainment()) {
        (Some(lines), true) => {
            let flags = feature_flags(lines, dem, threshold, "entrainment")?;
            Some(entrainment_mass(dem, &flags, general.rho_ent, general.h_ent)?)
        }
        _ => None,
    };
    let resistance = match (&inputs.resistance, plan.sim_type.resistance()) {
        (Some(lines), true) => {
            let flags = feature_flags(lines, dem, threshold, "resistance")?;
            Some(resistance_coefficients(&flags, general.d_res, general.cw, general.sres))
        }
        _ => None,
    };

    Ok(SimulationInputs {
        release,
        secondary,
        entrainment,
        resistance,
    })
}

/// Run every planned simulation of the batch.
///
/// `observer` receives each snapshot with the simulation name as soon as it is taken.
/// Setting `cancel` stops the running simulation after its current step and skips the
/// remaining ones.
pub fn run_batch<F>(
    inputs: &BatchInputs,
    cfg: &SimulationConfig,
    cancel: Arc<AtomicBool>,
    mut observer: F,
) -> AvaResult<BatchReport>
where
    F: FnMut(&str, &Snapshot) -> AvaResult<()>,
{
    let plans = plan_simulations(inputs, cfg)?;
    info!("Running {} simulation(s)", plans.len());

    let mut report = BatchReport::default();
    for plan in &plans {
        let mut ctx = SimulationContext::with_cancel_flag(plan.config.general.seed, Arc::clone(&cancel));
        if ctx.is_cancelled() {
            warn!("Batch cancelled, skipping {}", plan.name);
            continue;
        }

        let radius = plan.config.general.sph_kernel_radius;
        let dem = if (inputs.dem.neighbour_header().cellsize - radius).abs() > f64::EPSILON {
            Cow::Owned(inputs.dem.with_kernel_radius(radius)?)
        } else {
            Cow::Borrowed(&inputs.dem)
        };

        let outcome = prepare_inputs(inputs, &dem, plan).and_then(|sim_inputs| {
            DfaSimulation::new(plan.name.clone(), &dem, &plan.config)
                .run_with(sim_inputs, &mut ctx, |s| observer(&plan.name, s))
        });
        match outcome {
            Ok(result) => report.results.push(result),
            Err(error) if error.is_per_simulation() => {
                warn!("Simulation {} failed: {}", plan.name, error);
                report.failures.push(FailedSimulation {
                    name: plan.name.clone(),
                    error,
                });
            }
            Err(error) => return Err(error),
        }
    }
    info!(
        "Batch finished: {} completed, {} failed",
        report.results.len(),
        report.failures.len()
    );
    Ok(report)
}
