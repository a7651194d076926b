//! Per-particle force evaluation
//!
//! Forces are split into an explicit part and two rate terms that the integrator applies
//! implicitly:
//!
//! - explicit acceleration: gravity projected on the tangent plane, SPH pressure
//!   `-g_n grad h` and artificial viscosity relaxing each particle towards the
//!   kernel-averaged velocity of its neighbours,
//! - friction: deceleration magnitude `tau / (rho h)` from the basal shear stress,
//! - resistance: drag rate `k = cRes min(h, hRes) |u| / h`, so that `du/dt = -k u`.
//!
//! The normal stress entering the friction law is `rho h (g_n - |u|^2 u_hat . dn/ds)`,
//! the second term being the centripetal contribution of the surface curvature along the
//! flow direction.

use super::friction::Friction;
use crate::config::GeneralConfig;
use crate::core_types::Vec3;
use crate::grid::interpolation::{interpolate, InterpMethod};
use crate::grid::raster::Raster;
use crate::sph::gradient::{depth_gradient, SphGradient};
use crate::sph::SphContext;
use rayon::prelude::*;

/// Physical and numerical parameters of the force evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceParams {
    /// Flow density
    pub rho: f64,
    /// Gravitational acceleration
    pub g: f64,
    /// Friction law
    pub friction: Friction,
    /// Include the curvature term in the normal stress
    pub curvature: bool,
    /// Gradient discretisation
    pub gradient: SphGradient,
    /// Artificial viscosity relaxation per step, in `[0, 1]`
    pub viscosity: f64,
    /// Height of the resistance obstacles
    pub h_res: f64,
}

impl ForceParams {
    /// Parameters from the `GENERAL` section
    pub fn from_config(cfg: &GeneralConfig) -> Self {
        Self {
            rho: cfg.rho,
            g: cfg.grav_acc,
            friction: Friction::from_config(cfg),
            curvature: cfg.curvature_acc,
            gradient: cfg.sph_option,
            viscosity: cfg.sph_viscosity.clamp(0.0, 1.0),
            h_res: cfg.h_res,
        }
    }
}

/// Forces on every particle, per unit mass
#[derive(Debug, Clone, Default)]
pub struct Forces {
    /// Explicit acceleration (m/s²)
    pub acc: Vec<Vec3>,
    /// Friction deceleration magnitude (m/s²)
    pub friction: Vec<f64>,
    /// Resistance drag rate (1/s)
    pub drag: Vec<f64>,
    /// Unit surface normal at each particle
    pub normal: Vec<Vec3>,
}

/// Evaluate all forces for the current state.
///
/// # Arguments
///
/// * `ctx` - Particles, neighbour index, DEM and kernel
/// * `h` - Current flow depth of every particle
/// * `params` - Force parameters
/// * `c_res` - Resistance coefficient raster, if resistance is active
/// * `dt_sph` - Step length used to scale the viscous relaxation
pub fn compute_forces(
    ctx: &SphContext<'_>,
    h: &[f64],
    params: &ForceParams,
    c_res: Option<&Raster>,
    dt_sph: f64,
) -> Forces {
    let grad_h = depth_gradient(ctx, h, params.gradient);
    let cellsize = ctx.dem.header().cellsize;

    let per_particle: Vec<(Vec3, f64, f64, Vec3)> = (0..ctx.particles.n)
        .into_par_iter()
        .map(|p| {
            let parts = ctx.particles;
            let frame = ctx.frame(p);
            let n = frame.n;
            let u = parts.velocity(p);
            let speed = u.norm();
            let hp = h[p].max(1e-6);

            let gravity = Vec3::new(0.0, 0.0, -params.g);
            let g_tangent = gravity - n * gravity.dot(&n);
            let g_normal = params.g * n.z;

            let mut acc = g_tangent - grad_h[p] * g_normal;

            if params.viscosity > 0.0 && dt_sph > 0.0 {
                let mut weighted = Vec3::zeros();
                let mut weight = 0.0;
                ctx.for_each_in_support(p, &frame, |q, _, _, r| {
                    if h[q] <= 0.0 {
                        return;
                    }
                    let w = ctx.kernel.evaluate(r) * parts.m[q] / (params.rho * h[q]);
                    weighted += parts.velocity(q) * w;
                    weight += w;
                });
                if weight > 0.0 {
                    let mean = weighted / weight;
                    acc += (mean - u) * (params.viscosity / dt_sph);
                }
            }

            let mut curvature = 0.0;
            if params.curvature && speed > 1e-8 {
                let u_hat = u / speed;
                let horizontal = u_hat.x.hypot(u_hat.y);
                if horizontal > 1e-8 {
                    let (xa, ya) = (
                        parts.x[p] + cellsize * u_hat.x / horizontal,
                        parts.y[p] + cellsize * u_hat.y / horizontal,
                    );
                    if let Some(n_ahead) = ctx.dem.normal_at(xa, ya, InterpMethod::Bilinear) {
                        let ds = cellsize / horizontal;
                        curvature = -speed * speed * u_hat.dot(&(n_ahead - n)) / ds;
                    }
                }
            }
            let sigma_n = params.rho * hp * (g_normal + curvature);
            let tau = params
                .friction
                .shear_stress(sigma_n, speed, hp, params.rho, params.g);
            let friction = tau / (params.rho * hp);

            let drag = c_res
                .and_then(|r| interpolate(r, parts.x[p], parts.y[p], InterpMethod::Bilinear))
                .filter(|c| c.is_finite() && *c > 0.0)
                .map_or(0.0, |c| c * hp.min(params.h_res) * speed / hp);

            (acc, friction, drag, n)
        })
        .collect();

    let mut forces = Forces {
        acc: Vec::with_capacity(per_particle.len()),
        friction: Vec::with_capacity(per_particle.len()),
        drag: Vec::with_capacity(per_particle.len()),
        normal: Vec::with_capacity(per_particle.len()),
    };
    for (acc, friction, drag, normal) in per_particle {
        forces.acc.push(acc);
        forces.friction.push(friction);
        forces.drag.push(drag);
        forces.normal.push(normal);
    }
    forces
}

/// Apply friction and drag to a trial velocity without reversing it.
///
/// Drag is integrated implicitly (`u / (1 + dt k)`); friction removes at most the whole
/// speed, so a particle that friction would turn around stops instead.
#[inline]
pub fn apply_resisting(u: Vec3, friction: f64, drag: f64, dt: f64) -> Vec3 {
    let u = u / (1.0 + dt * drag);
    let speed = u.norm();
    let loss = dt * friction;
    if speed <= loss || speed == 0.0 {
        Vec3::zeros()
    } else {
        u * ((speed - loss) / speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrictModel;
    use crate::grid::dem::Dem;
    use crate::particles::{NeighbourGrid, ParticleInit, Particles};
    use crate::sph::SphKernel;
    use approx::assert_relative_eq;

    fn single(dem: &Dem, x: f64, y: f64) -> Particles {
        let z = dem.elevation_at(x, y, InterpMethod::Bilinear).unwrap();
        Particles::from_inits(
            &[ParticleInit {
                x,
                y,
                z,
                m: 1000.0,
                a: 5.0,
                h: 1.0,
            }],
            0.0,
        )
    }

    fn coulomb_params(mu: f64) -> ForceParams {
        let cfg = GeneralConfig {
            frict_model: FrictModel::Coulomb,
            mu,
            curvature_acc: false,
            sph_viscosity: 0.0,
            ..GeneralConfig::default()
        };
        ForceParams::from_config(&cfg)
    }

    #[test]
    fn test_gravity_on_inclined_plane() {
        let dem = Dem::inclined_plane(30, 20, 5.0, 30.0, 5.0).unwrap();
        let mut particles = single(&dem, 60.0, 50.0);
        let mut grid = NeighbourGrid::new(*dem.neighbour_header());
        grid.rebuild(&mut particles);
        let ctx = SphContext {
            particles: &particles,
            grid: &grid,
            dem: &dem,
            kernel: SphKernel::wendland(5.0),
            rho: 200.0,
        };
        let params = coulomb_params(0.2);
        let h = particles.h.clone();
        let forces = compute_forces(&ctx, &h, &params, None, 0.1);

        let slope = 30.0_f64.to_radians();
        // A lone particle has no depth gradient from the Shepard option at its own position
        let acc = forces.acc[0];
        assert_relative_eq!(acc.norm(), 9.81 * slope.sin(), epsilon = 1e-9);
        assert!(acc.x > 0.0 && acc.z < 0.0);
        assert_relative_eq!(forces.friction[0], 0.2 * 9.81 * slope.cos(), epsilon = 1e-9);
        assert_eq!(forces.drag[0], 0.0);
    }

    #[test]
    fn test_resistance_drag_rate() {
        let dem = Dem::flat(20, 20, 5.0, 0.0, 5.0).unwrap();
        let mut particles = single(&dem, 50.0, 50.0);
        particles.set_velocity(0, Vec3::new(10.0, 0.0, 0.0));
        let mut grid = NeighbourGrid::new(*dem.neighbour_header());
        grid.rebuild(&mut particles);
        let ctx = SphContext {
            particles: &particles,
            grid: &grid,
            dem: &dem,
            kernel: SphKernel::wendland(5.0),
            rho: 200.0,
        };
        let c_res = Raster::with_value(*dem.header(), 0.003);
        let h = particles.h.clone();
        let forces = compute_forces(&ctx, &h, &coulomb_params(0.0), Some(&c_res), 0.1);
        assert_relative_eq!(forces.drag[0], 0.003 * 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_friction_never_reverses_velocity() {
        let u = Vec3::new(0.5, 0.0, 0.0);
        assert_eq!(apply_resisting(u, 10.0, 0.0, 0.1), Vec3::zeros());
        let slowed = apply_resisting(u, 1.0, 0.0, 0.1);
        assert_relative_eq!(slowed.x, 0.4, epsilon = 1e-12);
        let dragged = apply_resisting(u, 0.0, 1.0, 0.1);
        assert_relative_eq!(dragged.x, 0.5 / 1.1, epsilon = 1e-12);
    }
}
