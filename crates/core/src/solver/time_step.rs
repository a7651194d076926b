//! Time-step selection

use crate::config::GeneralConfig;
use crate::particles::Particles;

/// CFL step `cfl * cellsize / max(|u| + sqrt(g h))`, `None` while nothing moves
pub fn cfl_time_step(particles: &Particles, cellsize: f64, g: f64, cfl: f64) -> Option<f64> {
    let max_speed = (0..particles.n)
        .map(|i| particles.velocity_magnitude(i) + (g * particles.h[i].max(0.0)).sqrt())
        .fold(0.0_f64, f64::max);
    (max_speed > 0.0 && max_speed.is_finite()).then(|| cfl * cellsize / max_speed)
}

/// Step length for the next step: the fixed `dt`, or the smaller of `dt` and the CFL step
pub fn select_time_step(cfg: &GeneralConfig, particles: &Particles, cellsize: f64) -> f64 {
    if !cfg.cfl_time_step {
        return cfg.dt;
    }
    cfl_time_step(particles, cellsize, cfg.grav_acc, cfg.cfl).map_or(cfg.dt, |cfl| cfl.min(cfg.dt))
}
