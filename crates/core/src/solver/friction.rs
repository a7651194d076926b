//! Basal friction laws
//!
//! Each law maps the basal normal stress `sigma_n`, the flow speed `u` and depth `h` to a
//! basal shear stress `tau` (Pa):
//!
//! ```text
//! Coulomb:  tau = mu sigma_n
//! Voellmy:  tau = mu sigma_n + rho g u^2 / xsi
//! SamosAT:  tau = tau0 + mu (1 + Rs0 / (Rs0 + Rs)) sigma_n + rho u^2 / (ln(h / R) / kappa + B)^2
//!           Rs = rho u^2 / sigma_n
//! ```
//!
//! The solver applies the resulting force against the tangential velocity and never lets
//! it reverse the velocity: a particle whose speed would drop below zero within the step
//! comes to rest.
//!
//! # References
//!
//! - Voellmy, A. (1955). Über die Zerstörungskraft von Lawinen. Schweizerische Bauzeitung
//!   73, 159-165.
//! - Sampl, P., Zwinger, T. (2004). Avalanche simulation with SAMOS. Annals of
//!   Glaciology 38, 393-398.

use crate::config::{FrictModel, GeneralConfig};

/// Friction law with its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Friction {
    /// Dry Coulomb friction
    Coulomb {
        /// Friction coefficient
        mu: f64,
    },
    /// Coulomb plus turbulent drag
    Voellmy {
        /// Friction coefficient
        mu: f64,
        /// Turbulence coefficient (m/s²)
        xsi: f64,
    },
    /// SamosAT calibrated law
    SamosAT {
        /// Friction coefficient `tan(delta)`
        mu: f64,
        /// Minimum shear stress (Pa)
        tau0: f64,
        /// Reference stress ratio
        rs0: f64,
        /// Von Kármán constant
        kappa: f64,
        /// Roughness height (m)
        r: f64,
        /// Turbulence constant
        b: f64,
    },
}

impl Friction {
    /// Law selected by `frictModel` with the configured parameters
    pub fn from_config(cfg: &GeneralConfig) -> Self {
        match cfg.frict_model {
            FrictModel::Coulomb => Self::Coulomb { mu: cfg.mu },
            FrictModel::Voellmy => Self::Voellmy {
                mu: cfg.mu,
                xsi: cfg.xsi,
            },
            FrictModel::SamosAT => Self::SamosAT {
                mu: cfg.mu,
                tau0: cfg.tau0,
                rs0: cfg.rs0,
                kappa: cfg.kappa,
                r: cfg.r,
                b: cfg.b,
            },
        }
    }

    /// Basal shear stress (Pa)
    ///
    /// # Arguments
    ///
    /// * `sigma_n` - Basal normal stress (Pa), clamped at zero
    /// * `u` - Flow speed (m/s)
    /// * `h` - Flow depth (m)
    /// * `rho` - Flow density (kg/m³)
    /// * `g` - Gravitational acceleration (m/s²)
    pub fn shear_stress(&self, sigma_n: f64, u: f64, h: f64, rho: f64, g: f64) -> f64 {
        let sigma_n = sigma_n.max(0.0);
        match *self {
            Self::Coulomb { mu } => mu * sigma_n,
            Self::Voellmy { mu, xsi } => mu * sigma_n + rho * g * u * u / xsi,
            Self::SamosAT {
                mu,
                tau0,
                rs0,
                kappa,
                r,
                b,
            } => {
                let rs = rho * u * u / (sigma_n + 1e-3);
                let ratio = (h / r).max(1.0);
                let turbulent = ratio.ln() / kappa + b;
                tau0 + mu * (1.0 + rs0 / (rs0 + rs)) * sigma_n + rho * u * u / (turbulent * turbulent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_coulomb_and_voellmy() {
        let coulomb = Friction::Coulomb { mu: 0.2 };
        assert_relative_eq!(coulomb.shear_stress(1000.0, 10.0, 1.0, 200.0, 9.81), 200.0);
        assert_eq!(coulomb.shear_stress(-5.0, 0.0, 1.0, 200.0, 9.81), 0.0);

        let voellmy = Friction::Voellmy { mu: 0.2, xsi: 1000.0 };
        let tau = voellmy.shear_stress(1000.0, 10.0, 1.0, 200.0, 9.81);
        assert_relative_eq!(tau, 200.0 + 200.0 * 9.81 * 100.0 / 1000.0);
    }

    #[test]
    fn test_samos_reduces_to_double_coulomb_at_rest() {
        let cfg = GeneralConfig::default();
        let samos = Friction::from_config(&cfg);
        // u = 0 -> Rs = 0 -> factor (1 + 1)
        let tau = samos.shear_stress(1000.0, 0.0, 1.0, 200.0, 9.81);
        assert_relative_eq!(tau, cfg.tau0 + 2.0 * cfg.mu * 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_samos_grows_with_speed() {
        let samos = Friction::from_config(&GeneralConfig::default());
        let slow = samos.shear_stress(2000.0, 5.0, 1.0, 200.0, 9.81);
        let fast = samos.shear_stress(2000.0, 40.0, 1.0, 200.0, 9.81);
        assert!(fast > slow);
    }
}
