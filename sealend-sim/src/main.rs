//! Sea Lending Simulator
//!
//! Runs the canonical lending scenario and prints the report as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Default configuration
//! cargo run -p sealend-sim
//!
//! # Borrow at the limit of a 50% loan-to-value
//! SEALEND_LOAN_TO_VALUE=0.5 SEALEND_BORROW_AMOUNT=100 cargo run -p sealend-sim
//! ```
//!
//! # Environment Variables
//!
//! - `SEALEND_ENV`: Environment (test, development, production)
//! - `SEALEND_LOAN_TO_VALUE`: Loan-to-value ratio (default: 0.75)
//! - `SEALEND_COLLATERAL_DECIMALS`: Collateral mint decimals (default: 6)
//! - `SEALEND_SUPPLY_AMOUNT`: Liquidity supplied (default: 200)
//! - `SEALEND_BORROW_AMOUNT`: Liquidity borrowed and repaid (default: 100)
//! - `SEALEND_INITIAL_BALANCE`: Owner's starting balance (default: 1000000)

use sealend_sim::{Config, Simulation};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("sealend_sim=info".parse()?)
                .add_directive("sealend_exec=info".parse()?),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        protocol = %config.protocol,
        supply = config.scenario.supply_amount,
        borrow = config.scenario.borrow_amount,
        "Sea Lending simulator"
    );

    let simulation = Simulation::new(config)?;
    let report = simulation.run().await?;

    info!(owner = %simulation.owner(), final_balance = report.final_balance, "Scenario complete");
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
