//! Simulation runs
//!
//! - [`DfaSimulation`]: time loop of one simulation, from seeding to the final snapshot
//! - [`run_batch`]: every release x simulation type x parameter value of a configuration
//! - [`SimulationContext`]: seeded RNG and cancellation flag owned by a run
//! - [`MassBalance`]: per-step mass log

pub mod batch;
pub mod context;
pub mod mass_balance;
pub mod run;

pub use batch::{
    config_hash, plan_simulations, prepare_inputs, run_batch, simulation_name, BatchInputs, BatchReport,
    FailedSimulation, ReleaseScenario, SimulationPlan,
};
pub use context::SimulationContext;
pub use mass_balance::{MassBalance, MassEntry};
pub use run::{DfaSimulation, SecondaryRelease, SimulationInputs, SimulationResult, Snapshot, StopReason};
