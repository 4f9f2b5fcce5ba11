//! Taleweave Server - command-line front end
//!
//! Settings loading, tracing setup and the bot simulator behind the
//! `taleweave` binary.

pub mod settings;
pub mod simulator;
pub mod telemetry;

pub use settings::{Settings, SimulationSettings};
pub use simulator::{run_simulator, SimulatorReport, Violation};
