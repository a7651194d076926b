//! Parabolic release on a 35 degree plane against the Savage-Hutter similarity solution
//!
//! The release is a parabolic ridge `h = H0 (1 - xi^2 / a0^2)` along the slope, uniform
//! across it. Away from the lateral edges the flow stays one-dimensional: the centre
//! slides with `g (sin - mu cos)` and the profile keeps its parabolic shape with
//! half-length `a(t)`, where `a'' = 3 g_n V / (2 a^2)` and `V = 4/3 H0 a0` is the volume
//! per unit width. Only particles in the middle of the ridge are compared.

mod common;

use avaframe_core::config::IntegratorKind;
use avaframe_core::grid::dem::Dem;
use avaframe_core::grid::raster::Raster;
use avaframe_core::particles::Particles;
use avaframe_core::simulation::{DfaSimulation, SimulationContext, SimulationInputs};
use avaframe_core::sph::SphGradient;
use common::scenario_config;

const G: f64 = 9.81;
const SLOPE_DEG: f64 = 35.0;
const H0: f64 = 2.0;
/// Initial half-length along the slope (m)
const A0: f64 = 50.0;
/// Horizontal position of the release centre
const X0: f64 = 80.0;
const Y_CENTRE: f64 = 300.0;
/// Half-width of the compared band across the slope
const BAND: f64 = 40.0;

/// Half-length `a(t)` from `a'' = c / a^2`, `a(0) = A0`, `a'(0) = 0` (RK4)
fn half_length(t: f64, c: f64) -> f64 {
    let dt = 1e-3;
    let rhs = |a: f64, v: f64| (v, c / (a * a));
    let (mut a, mut v) = (A0, 0.0);
    let steps = (t / dt).round() as usize;
    for _ in 0..steps {
        let (k1a, k1v) = rhs(a, v);
        let (k2a, k2v) = rhs(a + 0.5 * dt * k1a, v + 0.5 * dt * k1v);
        let (k3a, k3v) = rhs(a + 0.5 * dt * k2a, v + 0.5 * dt * k2v);
        let (k4a, k4v) = rhs(a + dt * k3a, v + dt * k3v);
        a += dt / 6.0 * (k1a + 2.0 * k2a + 2.0 * k3a + k4a);
        v += dt / 6.0 * (k1v + 2.0 * k2v + 2.0 * k3v + k4v);
    }
    a
}

/// `s` with `F(s) = q` for the parabola's mass distribution `F(s) = (2 + 3s - s^3) / 4`
fn parabola_quantile(q: f64) -> f64 {
    let (mut lo, mut hi) = (-1.0_f64, 1.0_f64);
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        if (2.0 + 3.0 * mid - mid.powi(3)) / 4.0 < q {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Along-slope coordinates and masses of the particles in the middle band
fn band(particles: &Particles, cos: f64) -> Vec<(f64, f64)> {
    (0..particles.n)
        .filter(|&p| (particles.y[p] - Y_CENTRE).abs() < BAND)
        .map(|p| (particles.x[p] / cos, particles.m[p]))
        .collect()
}

/// Mass-weighted quantile of sorted `(position, mass)` pairs
fn mass_quantile(sorted: &[(f64, f64)], q: f64) -> f64 {
    let total: f64 = sorted.iter().map(|&(_, m)| m).sum();
    let mut acc = 0.0;
    for &(s, m) in sorted {
        acc += m;
        if acc >= q * total {
            return s;
        }
    }
    sorted.last().map_or(f64::NAN, |&(s, _)| s)
}

#[test]
fn test_parabolic_ridge_follows_similarity_solution() {
    let theta = SLOPE_DEG.to_radians();
    let (sin, cos) = theta.sin_cos();
    let mu = 30f64.to_radians().tan();
    let g_n = G * cos;
    let acc = G * (sin - mu * cos);
    let spread = 1.5 * g_n * (4.0 / 3.0 * H0 * A0);

    let dem = Dem::inclined_plane(130, 120, 5.0, SLOPE_DEG, 5.0).unwrap();
    let release = Raster::from_fn(*dem.header(), |x, y| {
        let xi = (x - X0) / cos;
        if (150.0..=450.0).contains(&y) {
            (H0 * (1.0 - (xi / A0).powi(2))).max(0.0)
        } else {
            0.0
        }
    });

    let mut cfg = scenario_config(25.0);
    cfg.general.mu = mu;
    cfg.general.mass_per_part = 2500.0;
    cfg.general.integrator = IntegratorKind::LeapFrog;
    cfg.general.sph_option = SphGradient::FullCorrection;
    cfg.general.sph_viscosity = 0.0;
    cfg.general.t_steps = vec![5.0, 15.0];
    cfg.flags.save_particles = true;

    let sim = DfaSimulation::new("similarity", &dem, &cfg);
    let mut ctx = SimulationContext::new(cfg.general.seed);
    let (_, snapshots) = sim.run(SimulationInputs::release_only(release), &mut ctx).unwrap();

    let q = 0.05;
    let s_rear = parabola_quantile(q);
    let s_front = parabola_quantile(1.0 - q);
    let mut compared = Vec::new();
    for snap in snapshots.iter().filter(|s| s.time > 0.0) {
        let t = snap.time;
        let particles = snap.particles.as_ref().unwrap();
        let mut points = band(particles, cos);
        assert!(points.len() > 100, "t = {t}: {} particles in band", points.len());
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let a = half_length(t, spread);
        let depth = 3.0 * (4.0 / 3.0 * H0 * A0) / (4.0 * a);

        // Centre of mass: within 5 % of the sliding-block displacement
        let m_band: f64 = points.iter().map(|&(_, m)| m).sum();
        let centre = points.iter().map(|&(s, m)| s * m).sum::<f64>() / m_band;
        let displacement = centre - X0 / cos;
        let expected = 0.5 * acc * t * t;
        assert!(
            (displacement - expected).abs() < 0.05 * expected,
            "t = {t}: centre moved {displacement:.1} m, expected {expected:.1} m"
        );

        // Spread: a parabola has variance a^2 / 5; within 10 %
        let variance = points.iter().map(|&(s, m)| m * (s - centre).powi(2)).sum::<f64>() / m_band;
        let a_measured = (5.0 * variance).sqrt();
        assert!(
            (a_measured - a).abs() < 0.1 * a,
            "t = {t}: half-length {a_measured:.1} m, expected {a:.1} m"
        );

        // Front and rear (5 % and 95 % of the mass) within 10 % of the half-length
        let rear = mass_quantile(&points, q) - centre;
        let front = mass_quantile(&points, 1.0 - q) - centre;
        assert!((rear - s_rear * a).abs() < 0.1 * a, "t = {t}: rear {rear:.1}, expected {:.1}", s_rear * a);
        assert!((front - s_front * a).abs() < 0.1 * a, "t = {t}: front {front:.1}, expected {:.1}", s_front * a);

        // Flow depth in the inner part of the profile: within 15 %
        let mut ratio_sum = 0.0;
        let mut n_inner = 0;
        for p in 0..particles.n {
            if (particles.y[p] - Y_CENTRE).abs() >= BAND {
                continue;
            }
            let xi = particles.x[p] / cos - centre;
            if xi.abs() < 0.3 * a {
                ratio_sum += particles.h[p] / (depth * (1.0 - (xi / a).powi(2)));
                n_inner += 1;
            }
        }
        assert!(n_inner > 20);
        let ratio = ratio_sum / f64::from(n_inner);
        assert!((ratio - 1.0).abs() < 0.15, "t = {t}: depth ratio {ratio:.3}");

        compared.push(t);
    }
    assert_eq!(compared.len(), 3, "compared at {compared:?}");
}

#[test]
fn test_half_length_matches_energy_integral() {
    // 1/2 a'^2 = c (1/a0 - 1/a): check the integrator against the first integral
    let c = 1600.0;
    let a = half_length(10.0, c);
    let a_eps = half_length(10.0 + 1e-3, c);
    let velocity = (a_eps - a) / 1e-3;
    let energy = 0.5 * velocity * velocity;
    assert!((energy - c * (1.0 / A0 - 1.0 / a)).abs() < 1e-2 * energy);
    assert!((parabola_quantile(0.5)).abs() < 1e-12);
}
