//! Dense-flow avalanche solver
//!
//! The solver advances a particle population over a [`Dem`](crate::grid::Dem). The
//! options that change the numerics are small strategy values chosen once per run:
//!
//! - [`Friction`]: `Coulomb`, `Voellmy` or `SamosAT` basal shear stress
//! - [`SphGradient`](crate::sph::SphGradient): depth-gradient discretisation
//! - [`IntegratorKind`](crate::config::IntegratorKind): `Euler` or `LeapFrog`
//!
//! [`DfaSolver::step`] runs one step; [`FlowFields`] holds the grid fields it deposits
//! into.
//!
//! # Example
//!
//! ```rust,ignore
//! use avaframe_core::solver::{DfaSolver, FlowFields};
//!
//! let mut solver = DfaSolver::new(&dem, &cfg.general);
//! let mut fields = FlowFields::new(&dem);
//! let report = solver.step(&mut particles, &mut fields, 0.1)?;
//! ```

mod dfa;
pub mod fields;
pub mod forces;
pub mod friction;
pub mod time_step;

pub use dfa::{DfaSolver, StepReport};
pub use fields::{deposit_stencil, FlowFields};
pub use forces::{apply_resisting, compute_forces, ForceParams, Forces};
pub use friction::Friction;
pub use time_step::{cfl_time_step, select_time_step};
