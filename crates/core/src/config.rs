//! Typed simulation configuration
//!
//! Keys follow the spelling of the `.ini` configuration files (`rho`, `gravAcc`,
//! `sphKernelRadius`, ...) through `#[serde(rename_all = "camelCase")]`, so any serde
//! format the caller picks maps onto these structs directly. Every section implements
//! [`Default`] with the standard avalanche values; missing keys fall back to them.
//!
//! Sections:
//! - [`GeneralConfig`]: physics, numerics, time stepping and particle seeding
//! - [`FlagsConfig`]: export toggles
//! - [`InputConfig`]: which inputs to use and how to rasterise them
//! - [`ParameterVariation`]: one parameter swept over a list of values
//! - [`AimecConfig`]: path-domain post-processing

use crate::error::{AvaError, AvaResult};
use crate::grid::interpolation::InterpMethod;
use crate::grid::normals::NormalMethod;
use crate::sph::gradient::SphGradient;
use crate::sph::kernel::KernelShape;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bottom friction law (`frictModel`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrictModel {
    /// Dry Coulomb friction
    Coulomb,
    /// Coulomb plus turbulent drag
    Voellmy,
    /// Calibrated SamosAT law
    #[serde(rename = "samosAT", alias = "SamosAT")]
    SamosAT,
}

/// How the target mass per particle is determined (`massPerParticleDeterminationMethod`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MassPerPartMethod {
    /// `massPerPart` given directly
    #[serde(rename = "MPPDIR")]
    Direct,
    /// `rho * cellArea * deltaTh`
    #[serde(rename = "MPPDH")]
    DeltaThickness,
    /// Chosen so that `nPPK0` particles fall in one kernel area
    #[serde(rename = "MPPKR")]
    KernelRadius,
}

/// Particle placement inside a release cell (`initPartDistType`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitPartDistType {
    /// Regular `k x k` sub-grid
    Uniform,
    /// Sub-grid with jitter up to half a sub-cell
    Semirandom,
    /// Uniformly random positions
    Random,
}

/// Particle-to-grid interpolation (`interpOption`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum InterpOption {
    /// Everything into the nearest cell (0)
    Nearest,
    /// Equal weights on the four surrounding cells (1)
    EqualWeights,
    /// Bilinear weights (2)
    Bilinear,
}

impl TryFrom<u8> for InterpOption {
    type Error = AvaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Nearest),
            1 => Ok(Self::EqualWeights),
            2 => Ok(Self::Bilinear),
            other => Err(AvaError::config(
                "interpOption",
                format!("expected 0, 1 or 2, got {other}"),
            )),
        }
    }
}

impl From<InterpOption> for u8 {
    fn from(option: InterpOption) -> Self {
        match option {
            InterpOption::Nearest => 0,
            InterpOption::EqualWeights => 1,
            InterpOption::Bilinear => 2,
        }
    }
}

impl InterpOption {
    /// Method used when sampling grid fields at particle positions
    pub fn sample_method(self) -> InterpMethod {
        match self {
            Self::Nearest => InterpMethod::Nearest,
            Self::EqualWeights | Self::Bilinear => InterpMethod::Bilinear,
        }
    }
}

/// Time integration scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntegratorKind {
    /// Forward Euler
    Euler,
    /// Drift-kick-drift
    LeapFrog,
}

/// Which source terms are switched on for a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimType {
    /// No entrainment, no resistance
    Null,
    /// Entrainment only
    Ent,
    /// Resistance only
    Res,
    /// Entrainment and resistance
    EntRes,
    /// Whatever inputs are available
    Available,
}

impl SimType {
    /// Whether entrainment is active
    pub fn entrainment(self) -> bool {
        matches!(self, Self::Ent | Self::EntRes)
    }

    /// Whether resistance is active
    pub fn resistance(self) -> bool {
        matches!(self, Self::Res | Self::EntRes)
    }

    /// Resolve [`SimType::Available`] from the inputs present
    pub fn resolve(self, has_ent: bool, has_res: bool) -> Self {
        match self {
            Self::Available => match (has_ent, has_res) {
                (true, true) => Self::EntRes,
                (true, false) => Self::Ent,
                (false, true) => Self::Res,
                (false, false) => Self::Null,
            },
            other => other,
        }
    }
}

impl fmt::Display for SimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Ent => "ent",
            Self::Res => "res",
            Self::EntRes => "entres",
            Self::Available => "available",
        };
        f.write_str(name)
    }
}

/// Result field identifiers used in file names and AIMEC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResType {
    /// Peak pressure
    #[serde(rename = "ppr")]
    Ppr,
    /// Peak flow depth
    #[serde(rename = "pfd")]
    Pfd,
    /// Peak flow velocity
    #[serde(rename = "pfv")]
    Pfv,
    /// Peak travel angle
    #[serde(rename = "pta")]
    Pta,
    /// Flow thickness at a save time
    #[serde(rename = "FT")]
    Ft,
    /// Flow velocity at a save time
    #[serde(rename = "FV")]
    Fv,
}

impl ResType {
    /// Name used in file names
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ppr => "ppr",
            Self::Pfd => "pfd",
            Self::Pfv => "pfv",
            Self::Pta => "pta",
            Self::Ft => "FT",
            Self::Fv => "FV",
        }
    }

    /// Whether the field is a peak over the whole run
    pub fn is_peak(self) -> bool {
        matches!(self, Self::Ppr | Self::Pfd | Self::Pfv | Self::Pta)
    }
}

impl fmt::Display for ResType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physics, numerics and time stepping (`GENERAL` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralConfig {
    /// Snow density (kg/m³)
    pub rho: f64,
    /// Gravitational acceleration (m/s²)
    pub grav_acc: f64,
    /// Friction law
    pub frict_model: FrictModel,
    /// Coulomb friction coefficient
    pub mu: f64,
    /// Voellmy turbulence coefficient (m/s²)
    pub xsi: f64,
    /// SamosAT minimum shear stress (Pa)
    pub tau0: f64,
    /// SamosAT reference Reynolds-type scale (Pa)
    pub rs0: f64,
    /// SamosAT von Kármán constant
    pub kappa: f64,
    /// SamosAT roughness height (m)
    pub r: f64,
    /// SamosAT turbulence constant
    pub b: f64,
    /// Include the curvature term in the normal stress
    pub curvature_acc: bool,

    /// Entrainable snow depth (m)
    pub h_ent: f64,
    /// Entrainable snow density (kg/m³)
    pub rho_ent: f64,
    /// Resistance obstacle diameter (m)
    pub d_res: f64,
    /// Resistance drag coefficient
    pub cw: f64,
    /// Resistance obstacle spacing (m)
    pub sres: f64,
    /// Resistance obstacle height (m); drag acts on at most this depth
    pub h_res: f64,

    /// SPH kernel radius and neighbour-grid cell size (m)
    pub sph_kernel_radius: f64,
    /// SPH gradient variant (1 to 4)
    pub sph_option: SphGradient,
    /// SPH kernel family, fixed for a run
    pub sph_kernel: KernelShape,
    /// Artificial viscosity relaxation towards the neighbour-averaged velocity, in `[0, 1]`
    pub sph_viscosity: f64,
    /// Mesh cell size the DEM is expected at (m)
    pub mesh_cell_size: f64,
    /// Normal discretisation (1, 4, 6 or 8)
    pub method_mesh_normal: NormalMethod,
    /// Particle-to-grid interpolation (0, 1 or 2)
    pub interp_option: InterpOption,
    /// Time integration scheme
    pub integrator: IntegratorKind,

    /// Mass-per-particle determination
    pub mass_per_particle_determination_method: MassPerPartMethod,
    /// Target mass per particle for `MPPDIR` (kg)
    pub mass_per_part: f64,
    /// Thickness increment for `MPPDH` (m)
    pub delta_th: f64,
    /// Particles per kernel area for `MPPKR`
    pub n_ppk0: f64,
    /// Placement inside release cells
    pub init_part_dist_type: InitPartDistType,
    /// Random seed for placement and sampling
    pub seed: u64,
    /// Split particles heavier than 1.5 target masses
    pub split_option: bool,

    /// Release thickness when not read from the features (m)
    pub rel_th: f64,
    /// Secondary release thickness when not read from the features (m)
    pub sec_rel_th: f64,

    /// Fixed time step (s)
    pub dt: f64,
    /// Use the CFL rule; the smaller of `dt` and the CFL step is taken
    pub cfl_time_step: bool,
    /// CFL number
    pub cfl: f64,
    /// End time (s)
    pub t_end: f64,
    /// Interval between saved fields (s); 0 saves only the final step
    pub dt_save: f64,
    /// Additional explicit save times (s)
    pub t_steps: Vec<f64>,
    /// Stop when kinetic energy drops below this fraction of its peak
    pub stop_crit: f64,
    /// Remove particles thinner than this (m); 0 disables
    pub hmin: f64,

    /// Result fields to export
    pub res_type: Vec<ResType>,
    /// Simulation types to run for every release
    pub sim_type_list: Vec<SimType>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            rho: 200.0,
            grav_acc: 9.81,
            frict_model: FrictModel::SamosAT,
            mu: 0.155,
            xsi: 4000.0,
            tau0: 0.0,
            rs0: 0.222,
            kappa: 0.43,
            r: 0.05,
            b: 4.13,
            curvature_acc: true,
            h_ent: 0.3,
            rho_ent: 100.0,
            d_res: 0.3,
            cw: 0.5,
            sres: 5.0,
            h_res: 10.0,
            sph_kernel_radius: 5.0,
            sph_option: SphGradient::Shepard,
            sph_kernel: KernelShape::Wendland,
            sph_viscosity: 0.05,
            mesh_cell_size: 5.0,
            method_mesh_normal: NormalMethod::Cell,
            interp_option: InterpOption::Bilinear,
            integrator: IntegratorKind::LeapFrog,
            mass_per_particle_determination_method: MassPerPartMethod::DeltaThickness,
            mass_per_part: 1250.0,
            delta_th: 0.25,
            n_ppk0: 15.0,
            init_part_dist_type: InitPartDistType::Random,
            seed: 12345,
            split_option: false,
            rel_th: 1.0,
            sec_rel_th: 1.0,
            dt: 0.1,
            cfl_time_step: false,
            cfl: 0.5,
            t_end: 400.0,
            dt_save: 0.0,
            t_steps: Vec::new(),
            stop_crit: 0.01,
            hmin: 0.0,
            res_type: vec![ResType::Ppr, ResType::Pfd, ResType::Pfv],
            sim_type_list: vec![SimType::Null],
        }
    }
}

/// Export toggles (`FLAGS` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlagsConfig {
    /// Keep particle snapshots at save times
    pub save_particles: bool,
    /// Also write particle snapshots as CSV
    pub export_csv: bool,
    /// Columns of the particle CSV
    pub particle_properties: Vec<String>,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            save_particles: false,
            export_csv: false,
            particle_properties: ["m", "x", "y", "z", "velocityMagnitude"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

/// Input selection (`INPUT` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputConfig {
    /// Restrict the run to this release scenario (feature set name)
    pub release_scenario: Option<String>,
    /// Take release thickness from the `d0` attribute of each feature
    pub rel_th_from_shp: bool,
    /// Use secondary release areas
    pub sec_rel_area: bool,
    /// Point-in-polygon tolerance, in cell sizes
    pub threshold_point_in_poly: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            release_scenario: None,
            rel_th_from_shp: true,
            sec_rel_area: false,
            threshold_point_in_poly: 0.001,
        }
    }
}

/// One parameter swept over a list of values (`PARAMETERVAR` section)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParameterVariation {
    /// Key of the varied parameter (`mu`, `relTh`, ...)
    pub parameter: String,
    /// Values to run
    pub values: Vec<f64>,
}

/// Path-domain analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AimecConfig {
    /// Width of the path domain (m)
    pub domain_width: f64,
    /// Threshold defining the affected area and runout
    pub threshold_value: f64,
    /// Slope angle (degrees) marking the start of the runout area
    pub start_of_runout_area_angle: f64,
    /// Field analysed
    pub res_type: ResType,
    /// Contour levels for comparison plots
    pub contour_levels: Vec<f64>,
    /// Spacing of the (s, l) grid; DEM cell size when absent
    pub cell_size_sl: Option<f64>,
}

impl Default for AimecConfig {
    fn default() -> Self {
        Self {
            domain_width: 600.0,
            threshold_value: 1.0,
            start_of_runout_area_angle: 10.0,
            res_type: ResType::Ppr,
            contour_levels: vec![1.0, 3.0, 5.0, 10.0],
            cell_size_sl: None,
        }
    }
}

/// Full configuration of a DFA run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    /// `GENERAL` section
    pub general: GeneralConfig,
    /// `FLAGS` section
    pub flags: FlagsConfig,
    /// `INPUT` section
    pub input: InputConfig,
    /// `PARAMETERVAR` section
    pub parameter_var: Option<ParameterVariation>,
}

fn positive(key: &str, value: f64) -> AvaResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AvaError::config(key, format!("must be finite and positive, got {value}")))
    }
}

fn non_negative(key: &str, value: f64) -> AvaResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AvaError::config(key, format!("must be finite and non-negative, got {value}")))
    }
}

impl GeneralConfig {
    /// Check value ranges
    pub fn validate(&self) -> AvaResult<()> {
        positive("rho", self.rho)?;
        positive("gravAcc", self.grav_acc)?;
        non_negative("mu", self.mu)?;
        positive("xsi", self.xsi)?;
        non_negative("tau0", self.tau0)?;
        positive("rs0", self.rs0)?;
        positive("kappa", self.kappa)?;
        positive("r", self.r)?;
        non_negative("hEnt", self.h_ent)?;
        positive("rhoEnt", self.rho_ent)?;
        non_negative("dRes", self.d_res)?;
        non_negative("cw", self.cw)?;
        positive("sres", self.sres)?;
        positive("hRes", self.h_res)?;
        if !(0.0..=1.0).contains(&self.sph_viscosity) {
            return Err(AvaError::config(
                "sphViscosity",
                format!("must be in [0, 1], got {}", self.sph_viscosity),
            ));
        }
        positive("sphKernelRadius", self.sph_kernel_radius)?;
        positive("meshCellSize", self.mesh_cell_size)?;
        positive("massPerPart", self.mass_per_part)?;
        positive("deltaTh", self.delta_th)?;
        positive("nPPK0", self.n_ppk0)?;
        positive("relTh", self.rel_th)?;
        positive("secRelTh", self.sec_rel_th)?;
        positive("dt", self.dt)?;
        positive("tEnd", self.t_end)?;
        non_negative("dtSave", self.dt_save)?;
        non_negative("hmin", self.hmin)?;
        if !(self.cfl > 0.0 && self.cfl <= 1.0) {
            return Err(AvaError::config("cfl", format!("must be in (0, 1], got {}", self.cfl)));
        }
        if !(0.0..1.0).contains(&self.stop_crit) {
            return Err(AvaError::config(
                "stopCrit",
                format!("must be in [0, 1), got {}", self.stop_crit),
            ));
        }
        if let Some(t) = self.t_steps.iter().find(|t| !(t.is_finite() && **t >= 0.0)) {
            return Err(AvaError::config("tSteps", format!("invalid save time {t}")));
        }
        if self.sim_type_list.is_empty() {
            return Err(AvaError::config("simTypeList", "at least one simulation type required"));
        }
        Ok(())
    }

    /// Override one numeric parameter by its configuration key
    pub fn set_parameter(&mut self, key: &str, value: f64) -> AvaResult<()> {
        let slot = match key {
            "mu" => &mut self.mu,
            "rho" => &mut self.rho,
            "xsi" => &mut self.xsi,
            "tau0" => &mut self.tau0,
            "relTh" => &mut self.rel_th,
            "secRelTh" => &mut self.sec_rel_th,
            "hEnt" => &mut self.h_ent,
            "rhoEnt" => &mut self.rho_ent,
            "dRes" => &mut self.d_res,
            "cw" => &mut self.cw,
            "sres" => &mut self.sres,
            "dt" => &mut self.dt,
            "tEnd" => &mut self.t_end,
            "stopCrit" => &mut self.stop_crit,
            "massPerPart" => &mut self.mass_per_part,
            "deltaTh" => &mut self.delta_th,
            "sphKernelRadius" => &mut self.sph_kernel_radius,
            other => {
                return Err(AvaError::config(
                    "parameter",
                    format!("'{other}' cannot be varied"),
                ))
            }
        };
        *slot = value;
        Ok(())
    }
}

impl AimecConfig {
    /// Check value ranges
    pub fn validate(&self) -> AvaResult<()> {
        positive("domainWidth", self.domain_width)?;
        non_negative("thresholdValue", self.threshold_value)?;
        if !(0.0..90.0).contains(&self.start_of_runout_area_angle) {
            return Err(AvaError::config(
                "startOfRunoutAreaAngle",
                format!("must be in [0, 90), got {}", self.start_of_runout_area_angle),
            ));
        }
        if let Some(cs) = self.cell_size_sl {
            positive("cellSizeSL", cs)?;
        }
        Ok(())
    }
}

impl SimulationConfig {
    /// Check every section
    pub fn validate(&self) -> AvaResult<()> {
        self.general.validate()?;
        non_negative("thresholdPointInPoly", self.input.threshold_point_in_poly)?;
        if let Some(var) = &self.parameter_var {
            if var.values.is_empty() {
                return Err(AvaError::config("values", "parameter variation without values"));
            }
            // Probe the key on a scratch copy
            self.general.clone().set_parameter(&var.parameter, var.values[0])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(AimecConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_names_key() {
        let mut cfg = GeneralConfig::default();
        cfg.sph_kernel_radius = 0.0;
        match cfg.validate() {
            Err(AvaError::ConfigValue { key, .. }) => assert_eq!(key, "sphKernelRadius"),
            other => panic!("unexpected {other:?}"),
        }

        let mut cfg = GeneralConfig::default();
        cfg.stop_crit = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_parameter_override() {
        let mut cfg = GeneralConfig::default();
        cfg.set_parameter("mu", 0.3).unwrap();
        assert_eq!(cfg.mu, 0.3);
        assert!(cfg.set_parameter("colour", 1.0).is_err());

        let bad = SimulationConfig {
            parameter_var: Some(ParameterVariation {
                parameter: "unknown".into(),
                values: vec![1.0],
            }),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_sim_type_resolution() {
        assert_eq!(SimType::Available.resolve(true, false), SimType::Ent);
        assert_eq!(SimType::Available.resolve(false, false), SimType::Null);
        assert_eq!(SimType::Res.resolve(true, true), SimType::Res);
        assert!(SimType::EntRes.entrainment() && SimType::EntRes.resistance());
        assert_eq!(SimType::EntRes.to_string(), "entres");
    }

    #[test]
    fn test_interp_option_codes() {
        assert_eq!(InterpOption::try_from(2).unwrap(), InterpOption::Bilinear);
        assert!(InterpOption::try_from(3).is_err());
        assert_eq!(ResType::Ft.as_str(), "FT");
        assert!(!ResType::Fv.is_peak());
    }
}
