//! Sea Lending Simulator Library
//!
//! Runs the lending lifecycle end to end over stub custody and an
//! in-memory ledger.
//!
//! # Example
//!
//! ```rust,ignore
//! use sealend_sim::{Config, Simulation};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let report = Simulation::new(config).unwrap().run().await.unwrap();
//!     println!("{:?}", report);
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod scenario;

// Re-exports for convenience
pub use config::{Config, Environment, ScenarioConfig};
pub use error::{SimError, SimResult};
pub use scenario::{ScenarioReport, Simulation};
