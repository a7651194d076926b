//! File boundary of the avalanche simulator
//!
//! The core crate works on typed values only; this crate reads and writes them:
//! ESRI ASCII rasters, the `<avaDir>` input layout, and the result files of a run
//! (peak rasters, mass logs, particle snapshots, AIMEC tables).
//!
//! [`SnapshotWriter`] plugs into [`avaframe_core::simulation::run_batch`] as its observer so
//! results are persisted as soon as they are produced.

pub mod ascii_grid;
pub mod layout;
pub mod outputs;

pub use ascii_grid::{format_ascii_grid, parse_ascii_grid, read_ascii_grid, write_ascii_grid};
pub use layout::{discover_inputs, InputFolder, InputLayout, OutputLayout};
pub use outputs::{
    aimec_file_name, mass_file_name, peak_file_name, read_mass_log, read_particles_json, write_aimec_table,
    write_mass_log, write_particles_csv, write_particles_json, write_peak_field, write_snapshot_fields,
    ParticleColumn,
};

use avaframe_core::config::FlagsConfig;
use avaframe_core::error::AvaResult;
use avaframe_core::grid::dem::Dem;
use avaframe_core::simulation::{SimulationResult, Snapshot};
use std::path::PathBuf;

/// Writes snapshots and final results of simulations into an [`OutputLayout`]
#[derive(Debug)]
pub struct SnapshotWriter<'a> {
    layout: OutputLayout,
    dem: &'a Dem,
    flags: FlagsConfig,
    written: Vec<PathBuf>,
}

impl<'a> SnapshotWriter<'a> {
    /// Create the output directories and a writer for them
    pub fn new(layout: OutputLayout, dem: &'a Dem, flags: FlagsConfig) -> AvaResult<Self> {
        layout.create()?;
        Ok(Self {
            layout,
            dem,
            flags,
            written: Vec::new(),
        })
    }

    /// Persist one snapshot of simulation `sim`
    pub fn write(&mut self, sim: &str, snapshot: &Snapshot) -> AvaResult<()> {
        let peak_dir = self.layout.peak_files();
        self.written
            .extend(write_snapshot_fields(&peak_dir, self.dem, sim, snapshot)?);
        if let Some(particles) = &snapshot.particles {
            let dir = self.layout.particles();
            self.written.push(write_particles_json(&dir, sim, particles)?);
            if self.flags.export_csv {
                self.written.push(write_particles_csv(
                    &dir,
                    self.dem,
                    sim,
                    particles,
                    &self.flags.particle_properties,
                )?);
            }
        }
        Ok(())
    }

    /// Persist the mass log of a finished simulation
    pub fn finish(&mut self, result: &SimulationResult) -> AvaResult<()> {
        let path = write_mass_log(&self.layout.peak_files(), &result.name, &result.mass)?;
        self.written.push(path);
        Ok(())
    }

    /// Every file written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Output directories
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }
}
