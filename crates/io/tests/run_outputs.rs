//! Writes the results of a short run and reads them back

use approx::assert_relative_eq;
use avaframe_core::config::{GeneralConfig, MassPerPartMethod, SimulationConfig};
use avaframe_core::grid::dem::Dem;
use avaframe_core::grid::normals::NormalMethod;
use avaframe_core::grid::raster::{Raster, RasterHeader};
use avaframe_core::simulation::{DfaSimulation, SimulationContext, SimulationInputs};
use avaframe_io::{
    discover_inputs, read_ascii_grid, read_mass_log, read_particles_json, write_ascii_grid, OutputLayout,
    SnapshotWriter,
};
use std::fs;

/// Plane in world coordinates far from the origin, as DEMs come from files
fn world_dem_file(dir: &std::path::Path) -> std::path::PathBuf {
    let header = RasterHeader::new(40, 20, 5.0, 1000.0, 5000.0);
    let tan = 30f64.to_radians().tan();
    let raster = Raster::from_fn(header, |x, _| (1195.0 - x) * tan);
    let path = dir.join("Inputs").join("plane.asc");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    write_ascii_grid(&path, &raster).unwrap();
    path
}

#[test]
fn test_run_results_round_trip_through_files() {
    let tmp = tempfile::tempdir().unwrap();
    let ava = tmp.path();
    world_dem_file(ava);
    fs::create_dir_all(ava.join("Inputs/REL")).unwrap();
    fs::write(ava.join("Inputs/REL/rel.shp"), "").unwrap();

    let layout = discover_inputs(ava).unwrap();
    let raster = read_ascii_grid(&layout.dem).unwrap();
    assert_relative_eq!(raster.header.xllcenter, 1000.0);
    let dem = Dem::new(raster, NormalMethod::Four, 5.0).unwrap();
    assert_relative_eq!(dem.header().xllcenter, 0.0);

    let mut cfg = SimulationConfig {
        general: GeneralConfig {
            t_end: 1.0,
            dt: 0.1,
            dt_save: 0.5,
            mass_per_part: 2000.0,
            mass_per_particle_determination_method: MassPerPartMethod::Direct,
            ..GeneralConfig::default()
        },
        ..SimulationConfig::default()
    };
    cfg.flags.save_particles = true;
    cfg.flags.export_csv = true;

    let release = Raster::from_fn(*dem.header(), |x, y| {
        if (30.0..=50.0).contains(&x) && (40.0..=60.0).contains(&y) {
            1.0
        } else {
            0.0
        }
    });
    let sim = DfaSimulation::new("rel_test_null_dfa", &dem, &cfg);
    let mut writer = SnapshotWriter::new(OutputLayout::new(ava, "com1DFA"), &dem, cfg.flags.clone()).unwrap();
    let mut ctx = SimulationContext::new(cfg.general.seed);
    let result = sim
        .run_with(SimulationInputs::release_only(release), &mut ctx, |s| {
            writer.write("rel_test_null_dfa", s)
        })
        .unwrap();
    writer.finish(&result).unwrap();

    let peak_dir = writer.layout().peak_files();
    let final_ppr = read_ascii_grid(&peak_dir.join("rel_test_null_dfa_ppr.asc")).unwrap();
    // Re-shifted to world coordinates and written in kPa
    assert_relative_eq!(final_ppr.header.xllcenter, 1000.0);
    assert_relative_eq!(final_ppr.header.yllcenter, 5000.0);
    let ppr_max = result
        .fields
        .get(avaframe_core::config::ResType::Ppr)
        .max_finite()
        .unwrap();
    assert_relative_eq!(final_ppr.max_finite().unwrap(), ppr_max / 1000.0, max_relative = 1e-9);
    assert!(peak_dir.join("rel_test_null_dfa_pfd_t0.5.asc").is_file());
    assert!(peak_dir.join("rel_test_null_dfa_pfv_t0.asc").is_file());

    let mass = read_mass_log(&peak_dir.join("mass_rel_test_null_dfa.txt")).unwrap();
    assert_eq!(mass.entries.len(), result.mass.entries.len());
    assert_relative_eq!(mass.release_mass, result.mass.release_mass, max_relative = 1e-12);

    let particles = read_particles_json(&writer.layout().particles().join("particles_rel_test_null_dfa_1.json")).unwrap();
    assert_eq!(particles.n, result.particles.n);
    let csv = fs::read_to_string(writer.layout().particles().join("particles_rel_test_null_dfa_1.csv")).unwrap();
    assert!(csv.starts_with("m,x,y,z,velocityMagnitude\n"));
    assert_eq!(csv.lines().count(), particles.n + 1);
    // World x of every particle is east of the DEM origin
    let first_x: f64 = csv.lines().nth(1).unwrap().split(',').nth(1).unwrap().parse().unwrap();
    assert!(first_x > 1000.0);
}
