//! Simulator configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{SimError, SimResult};
use rust_decimal::Decimal;
use sealend_domain::{LoanToValue, ProtocolParams};
use std::env;
use std::str::FromStr;

// =============================================================================
// Configuration
// =============================================================================

/// Simulator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Protocol parameters handed to the program
    pub protocol: ProtocolParams,

    /// Scenario amounts
    pub scenario: ScenarioConfig,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Amounts used by the scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioConfig {
    /// Liquidity supplied by the owner
    pub supply_amount: u64,
    /// Liquidity borrowed, then repaid in full
    pub borrow_amount: u64,
    /// Liquidity airdropped to the owner before the run
    pub initial_balance: u64,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> SimResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let protocol = Self::load_protocol_params()?;
        let scenario = Self::load_scenario_config()?;

        Ok(Self { protocol, scenario, environment })
    }

    /// Create test configuration.
    ///
    /// LTV 0.5 with the 200 / 100 scenario borrows exactly at the limit.
    pub fn test() -> Self {
        Self {
            protocol: ProtocolParams {
                loan_to_value: LoanToValue::new(Decimal::new(5, 1)).unwrap_or_default(),
                collateral_decimals: 6,
            },
            scenario: ScenarioConfig::default(),
            environment: Environment::Test,
        }
    }

    fn load_environment() -> SimResult<Environment> {
        let env_str = env::var("SEALEND_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(SimError::Config(format!(
                "Invalid SEALEND_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_protocol_params() -> SimResult<ProtocolParams> {
        let defaults = ProtocolParams::default();

        let ratio = match env::var("SEALEND_LOAN_TO_VALUE") {
            Ok(val) => Decimal::from_str(&val).map_err(|_| {
                SimError::Config(format!("Invalid SEALEND_LOAN_TO_VALUE value: {}", val))
            })?,
            Err(_) => defaults.loan_to_value.as_decimal(),
        };
        let loan_to_value = LoanToValue::new(ratio)
            .map_err(|e| SimError::Config(format!("Invalid SEALEND_LOAN_TO_VALUE: {}", e)))?;

        let collateral_decimals = Self::load_int_env(
            "SEALEND_COLLATERAL_DECIMALS",
            defaults.collateral_decimals,
        )?;

        ProtocolParams::new(loan_to_value, collateral_decimals)
            .map_err(|e| SimError::Config(format!("Invalid SEALEND_COLLATERAL_DECIMALS: {}", e)))
    }

    fn load_scenario_config() -> SimResult<ScenarioConfig> {
        let defaults = ScenarioConfig::default();

        let scenario = ScenarioConfig {
            supply_amount: Self::load_int_env("SEALEND_SUPPLY_AMOUNT", defaults.supply_amount)?,
            borrow_amount: Self::load_int_env("SEALEND_BORROW_AMOUNT", defaults.borrow_amount)?,
            initial_balance: Self::load_int_env(
                "SEALEND_INITIAL_BALANCE",
                defaults.initial_balance,
            )?,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    fn load_int_env<T: FromStr>(key: &str, default: T) -> SimResult<T> {
        match env::var(key) {
            Ok(val) => val
                .parse::<T>()
                .map_err(|_| SimError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl ScenarioConfig {
    /// Reject amounts the scenario cannot run with.
    pub fn validate(&self) -> SimResult<()> {
        if self.supply_amount == 0 {
            return Err(SimError::Config("SEALEND_SUPPLY_AMOUNT must be positive".to_string()));
        }
        if self.borrow_amount == 0 {
            return Err(SimError::Config("SEALEND_BORROW_AMOUNT must be positive".to_string()));
        }
        if self.initial_balance < self.supply_amount {
            return Err(SimError::Config(format!(
                "SEALEND_INITIAL_BALANCE {} is below SEALEND_SUPPLY_AMOUNT {}",
                self.initial_balance, self.supply_amount
            )));
        }
        Ok(())
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            supply_amount: 200,
            borrow_amount: 100,
            initial_balance: 1_000_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: ProtocolParams::default(),
            scenario: ScenarioConfig::default(),
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
