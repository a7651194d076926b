//! Releases on flat and bowl-shaped terrain

mod common;

use approx::assert_relative_eq;
use avaframe_core::aimec::{analyse, AimecSimulation};
use avaframe_core::config::{AimecConfig, ResType};
use avaframe_core::grid::dem::Dem;
use avaframe_core::grid::interpolation::InterpMethod;
use avaframe_core::grid::polygon::Polyline;
use avaframe_core::simulation::{SimulationInputs, SimulationResult};
use common::{centroid, rectangle_release, run, scenario_config};

const G: f64 = 9.81;

fn total_energy(result: &SimulationResult) -> f64 {
    let p = &result.particles;
    (0..p.n)
        .map(|i| {
            let v2 = p.velocity_magnitude(i).powi(2);
            p.m[i] * (0.5 * v2 + G * p.z[i] + 0.5 * G * p.h[i])
        })
        .sum()
}

#[test]
fn test_flat_release_stays_in_place() {
    let dem = Dem::flat(40, 40, 5.0, 0.0, 5.0).unwrap();
    let cfg = scenario_config(3.0);
    let release = rectangle_release(&dem, 80.0, 120.0, 80.0, 120.0);
    let result = run(&dem, &cfg, SimulationInputs::release_only(release));
    let p = &result.particles;

    assert_relative_eq!(p.m_tot, result.mass.release_mass, max_relative = 1e-6);
    let (cx, cy) = centroid(&result);
    assert!((cx - 100.0).abs() < 0.5 && (cy - 100.0).abs() < 0.5);
    assert!(p.z.iter().all(|z| z.abs() < 1e-9));

    // Only the depth gradient drives the edges; friction holds them back
    let pfv = result.fields.get(ResType::Pfv).max_finite().unwrap();
    assert!(pfv < 5.0, "peak velocity {pfv}");
    let r = 3.0 * cfg.general.sph_kernel_radius;
    assert!(p.x.iter().chain(&p.y).all(|&c| c > 80.0 - r && c < 120.0 + r));

    // No slope steeper than the runout angle: the runout area starts at the path start
    let sims = [AimecSimulation {
        name: "flat",
        ppr: result.fields.get(ResType::Ppr),
        pfd: result.fields.get(ResType::Pfd),
        pfv: result.fields.get(ResType::Pfv),
        mass: Some(&result.mass),
    }];
    let path = Polyline::new("path", vec![20.0, 180.0], vec![100.0, 100.0]);
    let cfg = AimecConfig {
        domain_width: 60.0,
        res_type: ResType::Pfd,
        threshold_value: 0.1,
        ..AimecConfig::default()
    };
    let report = analyse(&dem, &path, &cfg, &sims, 0).unwrap();
    assert_eq!(report.sroa_index, 0);
    assert_relative_eq!(report.rows[0].runout_from_sroa, report.rows[0].l_runout);
}

#[test]
fn test_bowl_flow_stays_on_surface_and_loses_energy() {
    let dem = Dem::bowl(41, 41, 5.0, 100.0, 50.0, 5.0).unwrap();
    let mut cfg = scenario_config(0.0);
    let release = rectangle_release(&dem, 130.0, 150.0, 90.0, 110.0);

    cfg.general.t_end = 0.1;
    let start = run(&dem, &cfg, SimulationInputs::release_only(release.clone()));
    cfg.general.t_end = 10.0;
    let end = run(&dem, &cfg, SimulationInputs::release_only(release));

    let p = &end.particles;
    assert_relative_eq!(p.m_tot, end.mass.release_mass, max_relative = 1e-6);
    for i in 0..p.n {
        let surface = dem.elevation_at(p.x[i], p.y[i], InterpMethod::Bilinear).unwrap();
        assert!((p.z[i] - surface).abs() < 1e-6, "particle {i} off the surface");
    }
    // Release symmetric about y = 100 stays symmetric
    let (cx, cy) = centroid(&end);
    assert!((cy - 100.0).abs() < 1.0, "centroid y {cy}");
    assert!(cx < 140.0, "flow should have moved towards the bowl centre, x = {cx}");
    assert!(total_energy(&end) < total_energy(&start));
}
