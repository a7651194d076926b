//! Error taxonomy for the DFA kernel and the AIMEC pipeline
//!
//! Every fallible operation in the crate returns [`AvaResult`]. The variants mirror the
//! failure classes a run can hit: missing or malformed inputs, invalid configuration,
//! geometry outside the DEM, overlapping release features and numerical blow-up.
//!
//! # Example
//!
//! ```
//! use avaframe_core::error::{AvaError, AvaResult};
//!
//! fn check_rho(rho: f64) -> AvaResult<()> {
//!     if rho <= 0.0 {
//!         return Err(AvaError::config("rho", format!("must be positive, got {rho}")));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_rho(-1.0).is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type AvaResult<T> = Result<T, AvaError>;

/// Typed failures of the avalanche simulation pipeline
#[derive(Error, Debug)]
pub enum AvaError {
    /// Required input file absent or ambiguous (e.g. several DEMs in `Inputs/`)
    #[error("input missing: {path} ({message})")]
    InputMissing {
        /// Offending path
        path: PathBuf,
        /// What was expected there
        message: String,
    },

    /// Wrong extension or unparseable header/body
    #[error("input format error in {path}: {message}")]
    InputFormat {
        /// File being read
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Out-of-range or unknown configuration value
    #[error("invalid configuration value for '{key}': {message}")]
    ConfigValue {
        /// Configuration key, as spelled in the configuration file
        key: String,
        /// Reason the value was rejected
        message: String,
    },

    /// Polyline, split point or release geometry outside the DEM footprint
    #[error("{what} lies outside the DEM extent")]
    OutOfDem {
        /// Description of the geometry
        what: String,
    },

    /// Two features of the same layer overlap
    #[error("features '{first}' and '{second}' of layer {layer} overlap")]
    Overlap {
        /// Layer name (release, entrainment, ...)
        layer: String,
        /// First overlapping feature
        first: String,
        /// Second overlapping feature
        second: String,
    },

    /// Non-finite particle state after surface projection
    #[error("integration produced non-finite particle state at step {step} (t = {time:.3} s)")]
    IntegrationNaN {
        /// Index of the failing step
        step: usize,
        /// Simulation time of the failing step
        time: f64,
    },

    /// The path profile never drops below the beta angle
    #[error("no beta point found on profile '{profile}'")]
    NoBetaFound {
        /// Profile name
        profile: String,
    },

    /// Array or raster length does not match the expected shape
    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// What was being checked
        what: String,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Underlying filesystem error from the io adapters
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AvaError {
    /// Shorthand for a [`AvaError::ConfigValue`]
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an [`AvaError::OutOfDem`]
    pub fn out_of_dem(what: impl Into<String>) -> Self {
        Self::OutOfDem { what: what.into() }
    }

    /// Shorthand for a [`AvaError::ShapeMismatch`]
    pub fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Whether a batch run may record this failure against one simulation and continue.
    ///
    /// Everything else aborts the whole batch.
    pub fn is_per_simulation(&self) -> bool {
        matches!(self, Self::IntegrationNaN { .. } | Self::NoBetaFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_simulation_classification() {
        assert!(AvaError::IntegrationNaN { step: 3, time: 0.3 }.is_per_simulation());
        assert!(AvaError::NoBetaFound {
            profile: "path1".into()
        }
        .is_per_simulation());
        assert!(!AvaError::config("rho", "negative").is_per_simulation());
        assert!(!AvaError::out_of_dem("release").is_per_simulation());
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = AvaError::config("sphOption", "unknown value 7");
        assert!(err.to_string().contains("sphOption"));

        let err = AvaError::Overlap {
            layer: "release".into(),
            first: "rel1".into(),
            second: "rel2".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rel1") && msg.contains("rel2"));
    }
}
