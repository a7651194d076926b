//! Dense-flow avalanche simulation core
//!
//! A particle-in-cell solver for depth-integrated granular flow over a digital elevation
//! model, plus the AIMEC path-following transform used to compare and analyse results.
//!
//! ## Layout
//!
//! - [`grid`]: rasters, DEM with normals and cell areas, polygon rasterisation, paths
//! - [`particles`]: structure-of-arrays particle state and the neighbour grid
//! - [`sph`]: kernel, flow-depth and depth-gradient estimates
//! - [`solver`]: forces, friction laws, time integration, grid fields
//! - [`release`]: release/entrainment/resistance rasters and particle seeding
//! - [`simulation`]: time loop, mass balance, batch orchestration
//! - [`aimec`]: `(s, l)` transform, runout and area metrics
//!
//! Coordinates inside a run are origin-shifted: the DEM's lower-left cell centre sits at
//! `(0, 0)`. Polygons and paths are given in world coordinates and shifted on input;
//! [`Dem::to_world`] and [`Dem::to_world_raster`] shift results back.
//!
//! The library does no file I/O and installs no logging subscriber.

pub mod aimec;
pub mod config;
pub mod core_types;
pub mod error;
pub mod grid;
pub mod particles;
pub mod release;
pub mod simulation;
pub mod solver;
pub mod sph;

pub use aimec::{analyse, AimecReport, AimecRow, AimecSimulation, PathTransform};
pub use config::{AimecConfig, GeneralConfig, ResType, SimType, SimulationConfig};
pub use core_types::Vec3;
pub use error::{AvaError, AvaResult};
pub use grid::{Dem, LineSet, Polyline, Profile, Raster, RasterHeader};
pub use particles::Particles;
pub use simulation::{
    run_batch, BatchInputs, BatchReport, DfaSimulation, MassBalance, ReleaseScenario, SimulationContext,
    SimulationInputs, SimulationResult, Snapshot, StopReason,
};
pub use solver::{DfaSolver, FlowFields};
