//! Time loop of one DFA simulation

use super::context::SimulationContext;
use super::mass_balance::MassBalance;
use crate::config::{ResType, SimulationConfig};
use crate::error::AvaResult;
use crate::grid::dem::Dem;
use crate::grid::interpolation::{interpolate, InterpMethod};
use crate::grid::raster::Raster;
use crate::particles::Particles;
use crate::release::{initialise_particles, mass_per_particle};
use crate::solver::{select_time_step, DfaSolver, FlowFields};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Why the time loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// `t >= tEnd`
    EndTime,
    /// Kinetic energy fell below `stopCrit` times its peak
    StopCriterion,
    /// Cancelled between steps
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EndTime => "end time reached",
            Self::StopCriterion => "stop criterion reached",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Everything emitted at one save time
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Simulation time (s)
    pub time: f64,
    /// Whether this is the final step
    pub is_final: bool,
    /// Particle state, when particle saving is enabled
    pub particles: Option<Particles>,
    /// Requested result fields (peaks so far, or current `FT`/`FV`)
    pub fields: Vec<(ResType, Raster)>,
}

/// Secondary release area, triggered once by the flow entering it
#[derive(Debug, Clone)]
pub struct SecondaryRelease {
    /// Feature name
    pub name: String,
    /// Release thickness per cell (m)
    pub thickness: Raster,
    /// Whether it has been released
    pub triggered: bool,
}

impl SecondaryRelease {
    /// Untriggered secondary release
    pub fn new(name: impl Into<String>, thickness: Raster) -> Self {
        Self {
            name: name.into(),
            thickness,
            triggered: false,
        }
    }

    fn is_hit_by(&self, particles: &Particles) -> bool {
        (0..particles.n).any(|p| {
            interpolate(&self.thickness, particles.x[p], particles.y[p], InterpMethod::Nearest)
                .is_some_and(|h| h > 0.0)
        })
    }
}

/// Rasterised inputs of one simulation, on the DEM grid
#[derive(Debug, Clone)]
pub struct SimulationInputs {
    /// Release thickness per cell (m)
    pub release: Raster,
    /// Secondary releases
    pub secondary: Vec<SecondaryRelease>,
    /// Entrainable mass per cell (kg), when entrainment is active
    pub entrainment: Option<Raster>,
    /// Resistance coefficients, when resistance is active
    pub resistance: Option<Raster>,
}

impl SimulationInputs {
    /// Primary release only
    pub fn release_only(release: Raster) -> Self {
        Self {
            release,
            secondary: Vec::new(),
            entrainment: None,
            resistance: None,
        }
    }
}

/// Outcome of a completed simulation
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Simulation name
    pub name: String,
    /// Why the loop ended
    pub stop_reason: StopReason,
    /// Number of steps taken
    pub n_steps: usize,
    /// Final particle state
    pub particles: Particles,
    /// Final grid fields
    pub fields: FlowFields,
    /// Mass log
    pub mass: MassBalance,
    /// Mass per particle used for seeding (kg)
    pub mass_per_part: f64,
}

/// One configured DFA simulation on a DEM
#[derive(Debug)]
pub struct DfaSimulation<'a> {
    name: String,
    dem: &'a Dem,
    cfg: &'a SimulationConfig,
}

impl<'a> DfaSimulation<'a> {
    /// Simulation `name` of `cfg` on `dem`
    pub fn new(name: impl Into<String>, dem: &'a Dem, cfg: &'a SimulationConfig) -> Self {
        Self {
            name: name.into(),
            dem,
            cfg,
        }
    }

    /// Simulation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Save times in `(0, tEnd)`: multiples of `dtSave` and the explicit `tSteps`, sorted
    pub fn save_times(&self) -> Vec<f64> {
        let general = &self.cfg.general;
        let mut times: Vec<f64> = general
            .t_steps
            .iter()
            .copied()
            .filter(|&t| t < general.t_end)
            .collect();
        if general.dt_save > 0.0 {
            let mut k = 1.0;
            while k * general.dt_save < general.t_end {
                times.push(k * general.dt_save);
                k += 1.0;
            }
        }
        times.sort_by(f64::total_cmp);
        times.dedup();
        times
    }

    /// Run to completion, collecting every snapshot
    pub fn run(&self, inputs: SimulationInputs, ctx: &mut SimulationContext) -> AvaResult<(SimulationResult, Vec<Snapshot>)> {
        let mut snapshots = Vec::new();
        let result = self.run_with(inputs, ctx, |s| {
            snapshots.push(s.clone());
            Ok(())
        })?;
        Ok((result, snapshots))
    }

    /// Run to completion, handing each snapshot to `observer` as soon as it is taken.
    ///
    /// Observer errors abort the run. Snapshots are taken at time 0, at every save time
    /// and after the last completed step.
    pub fn run_with<F>(&self, inputs: SimulationInputs, ctx: &mut SimulationContext, mut observer: F) -> AvaResult<SimulationResult>
    where
        F: FnMut(&Snapshot) -> AvaResult<()>,
    {
        let general = &self.cfg.general;
        let dem = self.dem;
        let cellsize = dem.header().cellsize;

        let max_th = inputs.release.max_finite().unwrap_or(general.rel_th);
        let mpp = mass_per_particle(general, cellsize, max_th);
        let mut particles = initialise_particles(dem, &inputs.release, general, mpp, ctx.rng(), 0.0)?;
        let mut mass = MassBalance::new(particles.m_tot);

        let mut solver = DfaSolver::new(dem, general);
        if let Some(ent) = inputs.entrainment {
            solver = solver.with_entrainment(ent)?;
        }
        if let Some(res) = inputs.resistance {
            solver = solver.with_resistance(res)?;
        }
        if general.split_option {
            solver = solver.with_splitting(mpp);
        }
        let mut secondary = inputs.secondary;

        info!(
            "Starting {}: {} particles, {:.1} kg, tEnd {} s",
            self.name, particles.n, particles.m_tot, general.t_end
        );

        let mut fields = FlowFields::new(dem);
        solver.update_depth(&mut particles);
        fields.update(&particles, dem, general.interp_option, general.rho)?;
        observer(&self.snapshot(&particles, &fields, false))?;

        let save_times = self.save_times();
        let mut next_save = 0;
        let mut ke_peak = 0.0_f64;
        let stop_reason = loop {
            if ctx.is_cancelled() {
                break StopReason::Cancelled;
            }
            if particles.t >= general.t_end - 1e-9 {
                break StopReason::EndTime;
            }

            let dt = select_time_step(general, &particles, cellsize).min(general.t_end - particles.t);
            let report = match solver.step(&mut particles, &mut fields, dt) {
                Ok(report) => report,
                Err(err) => {
                    warn!(
                        "Aborting {} at t = {:.2} s with {} particles: {}",
                        self.name, particles.t, particles.n, err
                    );
                    return Err(err);
                }
            };

            for sec in secondary.iter_mut().filter(|s| !s.triggered) {
                if sec.is_hit_by(&particles) {
                    let th = sec.thickness.max_finite().unwrap_or(general.sec_rel_th);
                    let mpp_sec = mass_per_particle(general, cellsize, th);
                    let new = initialise_particles(dem, &sec.thickness, general, mpp_sec, ctx.rng(), particles.t)?;
                    info!(
                        "Secondary release '{}' triggered at t = {:.2} s: {} particles",
                        sec.name, particles.t, new.n
                    );
                    mass.release_mass += new.m_tot;
                    particles.merge(new);
                    sec.triggered = true;
                }
            }
            mass.push(particles.t, particles.m_tot, report.m_entrained);

            let ke = particles.kinetic_energy();
            ke_peak = ke_peak.max(ke);

            while next_save < save_times.len() && particles.t >= save_times[next_save] - 1e-9 {
                debug!("Saving {} at t = {:.2} s", self.name, particles.t);
                observer(&self.snapshot(&particles, &fields, false))?;
                next_save += 1;
            }

            if ke_peak > 0.0 && ke < general.stop_crit * ke_peak {
                break StopReason::StopCriterion;
            }
            if particles.n == 0 {
                break StopReason::StopCriterion;
            }
        };

        observer(&self.snapshot(&particles, &fields, true))?;
        info!(
            "Finished {} after {} steps at t = {:.2} s ({}), final mass {:.1} kg",
            self.name,
            solver.step_count(),
            particles.t,
            stop_reason,
            particles.m_tot
        );

        Ok(SimulationResult {
            name: self.name.clone(),
            stop_reason,
            n_steps: solver.step_count(),
            particles,
            fields,
            mass,
            mass_per_part: mpp,
        })
    }

    fn snapshot(&self, particles: &Particles, fields: &FlowFields, is_final: bool) -> Snapshot {
        Snapshot {
            time: particles.t,
            is_final,
            particles: self.cfg.flags.save_particles.then(|| particles.clone()),
            fields: self
                .cfg
                .general
                .res_type
                .iter()
                .map(|&r| (r, fields.get(r).clone()))
                .collect(),
        }
    }
}
