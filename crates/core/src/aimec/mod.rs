//! AIMEC: path-following transform and runout analysis
//!
//! [`PathTransform`] resamples result rasters onto a grid aligned with an avalanche path
//! (`s` along it, `l` across it). [`analyse`] extracts runout, area and mass metrics for a
//! set of simulations against a reference.
//!
//! # References
//! Fischer, J.-T. (2013). A novel approach to evaluate and compare computational snow
//! avalanche simulation. *Natural Hazards and Earth System Sciences*, 13, 1655-1667.

pub mod analysis;
pub mod transform;

pub use analysis::{
    along_path_profiles, analyse, area_metrics, cross_profile, difference_stats, runout, start_of_runout_area,
    AimecReport, AimecRow, AimecSimulation, AreaMetrics, DiffStats, MassComparison, PathProfiles, Runout,
};
pub use transform::PathTransform;
