//! The same release on planes facing different directions

mod common;

use approx::assert_relative_eq;
use avaframe_core::aimec::{analyse, AimecSimulation};
use avaframe_core::config::{AimecConfig, ResType};
use avaframe_core::grid::dem::Dem;
use avaframe_core::grid::normals::NormalMethod;
use avaframe_core::grid::polygon::Polyline;
use avaframe_core::grid::raster::Raster;
use avaframe_core::simulation::SimulationInputs;
use common::{centroid, rectangle_release, run, scenario_config};

const SIZE: usize = 40;
const CELL: f64 = 5.0;

#[test]
fn test_rotated_plane_gives_same_runout() {
    let extent = (SIZE - 1) as f64 * CELL;
    let tan = 30f64.to_radians().tan();
    let east = Dem::inclined_plane(SIZE, SIZE, CELL, 30.0, CELL).unwrap();
    let north = Dem::from_fn(SIZE, SIZE, CELL, NormalMethod::Four, CELL, move |_, y| (extent - y) * tan).unwrap();
    let cfg = scenario_config(4.0);

    // (x, y) -> (extent - y, x) maps the east-facing release onto the north-facing one
    let a = run(
        &east,
        &cfg,
        SimulationInputs::release_only(rectangle_release(&east, 30.0, 50.0, 80.0, 110.0)),
    );
    let b = run(
        &north,
        &cfg,
        SimulationInputs::release_only(rectangle_release(&north, extent - 110.0, extent - 80.0, 30.0, 50.0)),
    );
    assert_eq!(a.particles.n, b.particles.n);

    let (ax, ay) = centroid(&a);
    let (bx, by) = centroid(&b);
    assert_relative_eq!(ax - 40.0, by - 40.0, max_relative = 0.02);
    assert!((bx - (extent - ay)).abs() < 0.5);

    let front_a = a.particles.x.iter().copied().fold(f64::MIN, f64::max);
    let front_b = b.particles.y.iter().copied().fold(f64::MIN, f64::max);
    assert_relative_eq!(front_a - 50.0, front_b - 50.0, max_relative = 0.02);

    let mean_z = |p: &avaframe_core::particles::Particles| p.z.iter().zip(&p.m).map(|(z, m)| z * m).sum::<f64>() / p.m_tot;
    assert!((mean_z(&a.particles) - mean_z(&b.particles)).abs() < 1.0);
}

/// Outcome of one run on a plane descending towards `angle_deg`, in path-aligned terms
struct RotatedRun {
    /// Centroid displacement along the fall line (m)
    downslope: f64,
    /// Centroid displacement across the fall line (m)
    lateral: f64,
    /// `sum(pfd) * cell area` (m3)
    pfd_integral: f64,
    /// `sum(ppr) * cell area`
    ppr_integral: f64,
    /// AIMEC runout along the path (m)
    runout: f64,
    /// Mass-weighted mean elevation at the end (m)
    z_end: f64,
}

const ROT_SIZE: usize = 60;

fn run_rotated(angle_deg: f64) -> RotatedRun {
    let c = (ROT_SIZE - 1) as f64 * CELL / 2.0;
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let tan = 30f64.to_radians().tan();
    let dem = Dem::from_fn(ROT_SIZE, ROT_SIZE, CELL, NormalMethod::Four, CELL, move |x, y| {
        (200.0 - (x - c) * cos - (y - c) * sin) * tan
    })
    .unwrap();

    // Smooth cap 60 m upslope of the centre, so rasterisation hardly depends on the angle
    let (rx, ry) = (c - 60.0 * cos, c - 60.0 * sin);
    let release = Raster::from_fn(*dem.header(), |x, y| {
        let r2 = (x - rx).powi(2) + (y - ry).powi(2);
        (1.0 - r2 / 400.0).max(0.0)
    });
    let total: f64 = release.sum_finite();
    let (mut x0, mut y0) = (0.0, 0.0);
    for row in 0..ROT_SIZE {
        for col in 0..ROT_SIZE {
            let (x, y) = dem.header().cell_center(col, row);
            x0 += release.get(col, row) * x / total;
            y0 += release.get(col, row) * y / total;
        }
    }

    let result = run(&dem, &scenario_config(4.0), SimulationInputs::release_only(release));
    let (cx, cy) = centroid(&result);
    let (dx, dy) = (cx - x0, cy - y0);

    let path = Polyline::new(
        "fall line",
        vec![c - 100.0 * cos, c + 100.0 * cos],
        vec![c - 100.0 * sin, c + 100.0 * sin],
    );
    let aimec = AimecConfig {
        domain_width: 80.0,
        start_of_runout_area_angle: 35.0,
        res_type: ResType::Pfd,
        threshold_value: 0.05,
        cell_size_sl: Some(1.0),
        ..AimecConfig::default()
    };
    let sims = [AimecSimulation {
        name: "rotated",
        ppr: result.fields.get(ResType::Ppr),
        pfd: result.fields.get(ResType::Pfd),
        pfv: result.fields.get(ResType::Pfv),
        mass: Some(&result.mass),
    }];
    let report = analyse(&dem, &path, &aimec, &sims, 0).unwrap();

    let cell_area = CELL * CELL;
    RotatedRun {
        downslope: dx * cos + dy * sin,
        lateral: -dx * sin + dy * cos,
        pfd_integral: result.fields.get(ResType::Pfd).sum_finite() * cell_area,
        ppr_integral: result.fields.get(ResType::Ppr).sum_finite() * cell_area,
        runout: report.rows[0].l_runout,
        z_end: result.particles.z.iter().zip(&result.particles.m).map(|(z, m)| z * m).sum::<f64>()
            / result.particles.m_tot,
    }
}

#[test]
fn test_release_rotated_through_twelve_angles() {
    let reference = run_rotated(0.0);
    assert!(reference.downslope > 10.0);
    assert!(reference.runout.is_finite());

    for k in 1..12u32 {
        let angle = 30.0 * f64::from(k);
        let rotated = run_rotated(angle);
        assert_relative_eq!(rotated.downslope, reference.downslope, max_relative = 0.02);
        assert!(rotated.lateral.abs() < 1.0, "{angle} deg: lateral drift {}", rotated.lateral);
        assert!((rotated.z_end - reference.z_end).abs() < 1.0, "{angle} deg: zEnd {}", rotated.z_end);
        assert_relative_eq!(rotated.pfd_integral, reference.pfd_integral, max_relative = 0.08);
        assert_relative_eq!(rotated.ppr_integral, reference.ppr_integral, max_relative = 0.15);
        // Runout agrees to within one DEM cell
        assert!(
            (rotated.runout - reference.runout).abs() <= CELL,
            "{angle} deg: runout {} vs {}",
            rotated.runout,
            reference.runout
        );
    }
}

#[test]
fn test_off_grid_diagonal_matches_axis_run() {
    let axis = run_rotated(0.0);
    let diagonal = run_rotated(45.0);
    assert_relative_eq!(diagonal.downslope, axis.downslope, max_relative = 0.02);
    assert!(diagonal.lateral.abs() < 1.0);
    assert_relative_eq!(diagonal.pfd_integral, axis.pfd_integral, max_relative = 0.08);
}
