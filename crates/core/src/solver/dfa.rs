//! Dense-flow time step
//!
//! [`DfaSolver`] owns the per-run state that is not particle state: the neighbour index,
//! the remaining entrainable mass and the resistance coefficients. One call to
//! [`DfaSolver::step`] advances particles and grid fields by one step:
//!
//! 1. rebuild the neighbour index and estimate the flow depth,
//! 2. evaluate forces (gravity, SPH pressure, viscosity, friction, resistance),
//! 3. integrate velocities and positions (Euler or Leap-Frog), entraining mass on the way,
//! 4. project positions and velocities back onto the surface,
//! 5. remove particles leaving the DEM or thinner than `hmin`, split heavy ones,
//! 6. deposit the particles onto the grid fields and refresh particle areas.

use super::fields::FlowFields;
use super::forces::{apply_resisting, compute_forces, ForceParams};
use crate::config::{GeneralConfig, IntegratorKind, InterpOption};
use crate::error::{AvaError, AvaResult};
use crate::grid::dem::Dem;
use crate::grid::interpolation::{cell_weights, InterpMethod};
use crate::grid::raster::Raster;
use crate::particles::{NeighbourGrid, Particles};
use crate::sph::{flow_depth, SphContext, SphKernel};
use tracing::debug;

/// What one step changed besides the particle state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    /// Step length used (s)
    pub dt: f64,
    /// Mass entrained during the step (kg)
    pub m_entrained: f64,
    /// Particles removed (out of DEM or too thin)
    pub n_removed: usize,
    /// Particles created by splitting
    pub n_split: usize,
}

/// Time integrator for one simulation
#[derive(Debug, Clone)]
pub struct DfaSolver<'a> {
    dem: &'a Dem,
    params: ForceParams,
    kernel: SphKernel,
    integrator: IntegratorKind,
    interp_option: InterpOption,
    hmin: f64,
    split_mass: Option<f64>,
    rho_ent: f64,
    h_ent: f64,
    grid: NeighbourGrid,
    entrainable: Option<Raster>,
    c_res: Option<Raster>,
    step_count: usize,
}

impl<'a> DfaSolver<'a> {
    /// Solver on `dem` configured by `cfg`, without entrainment or resistance
    pub fn new(dem: &'a Dem, cfg: &GeneralConfig) -> Self {
        Self {
            dem,
            params: ForceParams::from_config(cfg),
            kernel: SphKernel::new(cfg.sph_kernel, cfg.sph_kernel_radius),
            integrator: cfg.integrator,
            interp_option: cfg.interp_option,
            hmin: cfg.hmin,
            split_mass: None,
            rho_ent: cfg.rho_ent,
            h_ent: cfg.h_ent,
            grid: NeighbourGrid::new(*dem.neighbour_header()),
            entrainable: None,
            c_res: None,
            step_count: 0,
        }
    }

    /// Entrain from `mass`, the entrainable mass per DEM cell (kg)
    pub fn with_entrainment(mut self, mass: Raster) -> AvaResult<Self> {
        self.check_grid(&mass, "entrainment raster")?;
        self.entrainable = Some(mass);
        Ok(self)
    }

    /// Apply resistance with coefficients `c_res` per DEM cell
    pub fn with_resistance(mut self, c_res: Raster) -> AvaResult<Self> {
        self.check_grid(&c_res, "resistance raster")?;
        self.c_res = Some(c_res);
        Ok(self)
    }

    /// Split particles heavier than 1.5 times `mass_per_part` after every step
    pub fn with_splitting(mut self, mass_per_part: f64) -> Self {
        self.split_mass = Some(mass_per_part);
        self
    }

    fn check_grid(&self, raster: &Raster, what: &str) -> AvaResult<()> {
        let expected = self.dem.header().len();
        if raster.data.len() == expected {
            Ok(())
        } else {
            Err(AvaError::shape(what, expected, raster.data.len()))
        }
    }

    /// Terrain the solver runs on
    pub fn dem(&self) -> &'a Dem {
        self.dem
    }

    /// Neighbour index as of the last rebuild
    pub fn neighbour_grid(&self) -> &NeighbourGrid {
        &self.grid
    }

    /// Entrainable mass still left per cell
    pub fn entrainable_mass(&self) -> Option<&Raster> {
        self.entrainable.as_ref()
    }

    /// Number of completed steps
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Rebuild the neighbour index and store the SPH flow depth on the particles
    pub fn update_depth(&mut self, particles: &mut Particles) {
        self.grid.rebuild(particles);
        let ctx = SphContext {
            particles,
            grid: &self.grid,
            dem: self.dem,
            kernel: self.kernel,
            rho: self.params.rho,
        };
        let h = flow_depth(&ctx);
        particles.h = h;
    }

    /// Advance `particles` and `fields` by `dt`.
    ///
    /// Fails with [`AvaError::IntegrationNaN`] if the particle state becomes non-finite.
    pub fn step(&mut self, particles: &mut Particles, fields: &mut FlowFields, dt: f64) -> AvaResult<StepReport> {
        let m_entrained = match self.integrator {
            IntegratorKind::Euler => {
                let m_ent = self.kick(particles, dt, dt);
                self.drift(particles, dt);
                m_ent
            }
            IntegratorKind::LeapFrog => {
                self.drift(particles, 0.5 * dt);
                let m_ent = self.kick(particles, dt, 0.5 * dt);
                self.drift(particles, 0.5 * dt);
                m_ent
            }
        };
        particles.t += dt;
        self.step_count += 1;

        if particles.has_non_finite() {
            return Err(AvaError::IntegrationNaN {
                step: self.step_count,
                time: particles.t,
            });
        }

        let mut n_removed = particles.remove_out_of_dem(self.dem, dt);
        if self.hmin > 0.0 {
            n_removed += particles.remove_small_part(self.hmin);
        }
        let n_split = self.split_mass.map_or(0, |m| particles.split_part(m));

        fields.update(particles, self.dem, self.interp_option, self.params.rho)?;
        self.update_areas(particles, fields);

        debug!(
            "step {} t={:.3} dt={:.4} N={} mTot={:.1} KE={:.1}",
            self.step_count,
            particles.t,
            dt,
            particles.n,
            particles.m_tot,
            particles.kinetic_energy()
        );

        Ok(StepReport {
            dt,
            m_entrained,
            n_removed,
            n_split,
        })
    }

    /// Velocity update over `dt` with forces evaluated at the current positions.
    ///
    /// `dt_sph` scales the viscous relaxation. Returns the entrained mass.
    fn kick(&mut self, particles: &mut Particles, dt: f64, dt_sph: f64) -> f64 {
        self.update_depth(particles);
        let forces = {
            let ctx = SphContext {
                particles,
                grid: &self.grid,
                dem: self.dem,
                kernel: self.kernel,
                rho: self.params.rho,
            };
            compute_forces(&ctx, &particles.h, &self.params, self.c_res.as_ref(), dt_sph)
        };

        for p in 0..particles.n {
            let u = particles.velocity(p) + forces.acc[p] * dt;
            let n = forces.normal[p];
            let u = u - n * u.dot(&n);
            let u = apply_resisting(u, forces.friction[p], forces.drag[p], dt);
            particles.set_velocity(p, u);
        }

        self.entrain(particles, dt)
    }

    /// Move particles along their velocity and project them back onto the surface
    fn drift(&self, particles: &mut Particles, dt: f64) {
        for p in 0..particles.n {
            let u = particles.velocity(p);
            let x_old = particles.position(p);
            let x = particles.x[p] + dt * u.x;
            let y = particles.y[p] + dt * u.y;
            let z = self
                .dem
                .elevation_at(x, y, InterpMethod::Bilinear)
                .unwrap_or(particles.z[p] + dt * u.z);
            particles.x[p] = x;
            particles.y[p] = y;
            particles.z[p] = z;
            particles.s[p] += (particles.position(p) - x_old).norm();

            if let Some(n) = self.dem.normal_at(x, y, InterpMethod::Bilinear) {
                particles.set_velocity(p, u - n * u.dot(&n));
            }
        }
    }

    /// Pick up snow from the cells particles move through.
    ///
    /// A particle sweeps `sqrt(a) |u| dt` square metres per step and gains
    /// `rho_ent h_ent` kg per square metre, bounded by what is left in its cell. The
    /// entrained snow starts at rest, so momentum is conserved and the particle slows down.
    fn entrain(&mut self, particles: &mut Particles, dt: f64) -> f64 {
        let Some(remaining) = self.entrainable.as_mut() else {
            return 0.0;
        };
        let header = remaining.header;
        let mass_per_area = self.rho_ent * self.h_ent;
        let mut total = 0.0;
        for p in 0..particles.n {
            let speed = particles.velocity_magnitude(p);
            if speed <= 0.0 {
                continue;
            }
            let Some(stencil) = cell_weights(&header, particles.x[p], particles.y[p], InterpMethod::Nearest) else {
                continue;
            };
            let corners = stencil.indices(header.ncols);
            let Some(k) = (0..4).find(|&k| stencil.weights[k] == 1.0) else {
                continue;
            };
            let cell = corners[k];
            let available = remaining.data[cell];
            if !(available > 0.0) {
                continue;
            }
            let swept = particles.a[p].max(0.0).sqrt() * speed * dt;
            let dm = (mass_per_area * swept).min(available);
            if dm <= 0.0 {
                continue;
            }
            remaining.data[cell] -= dm;
            let m_old = particles.m[p];
            let m_new = m_old + dm;
            particles.set_velocity(p, particles.velocity(p) * (m_old / m_new));
            particles.m[p] = m_new;
            particles.m_ent[p] += dm;
            total += dm;
        }
        if total > 0.0 {
            particles.update_mass_total();
        }
        total
    }

    /// Refresh particle areas from the deposited flow depth, `a = m / (rho FD)`.
    ///
    /// Keeps the SPH depth estimate consistent with the spreading of the flow.
    fn update_areas(&self, particles: &mut Particles, fields: &FlowFields) {
        let rho = self.params.rho;
        for p in 0..particles.n {
            if let Some(fd) = fields.depth_at(particles.x[p], particles.y[p]) {
                if fd > 1e-6 {
                    particles.a[p] = particles.m[p] / (rho * fd);
                }
            }
        }
    }
}
