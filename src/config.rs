use std::path::PathBuf;

use chrono::Duration;
use clap::Args;
use rust_decimal::Decimal;

use crate::benefits::CoverageRate;
use crate::error::{BenefitError, Result};
use crate::fee_schedule::FeeSchedule;
use crate::session::Role;

/// One year.
pub const MAX_SESSION_TIMEOUT_MINS: i64 = 365 * 24 * 60;

/// Application configuration shared by every subcommand
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// TOML fee schedule overriding the built-in one
    #[arg(long, global = true)]
    pub fee_schedule: Option<PathBuf>,

    /// Coverage applied when the plan reports nothing for a procedure
    #[arg(long, global = true, default_value = "0.80")]
    pub fallback_rate: Decimal,

    /// Lower bound of the simulated verification latency
    #[arg(long, global = true, default_value_t = 2000)]
    pub min_delay_ms: u64,

    /// Upper bound of the simulated verification latency
    #[arg(long, global = true, default_value_t = 2000)]
    pub max_delay_ms: u64,

    #[arg(long, global = true, default_value_t = 30)]
    pub session_timeout_mins: i64,

    /// Reject procedure codes missing from the fee schedule instead of costing them at zero
    #[arg(long, global = true)]
    pub strict_codes: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fee_schedule: None,
            fallback_rate: CoverageRate::DEFAULT_FALLBACK.fraction(),
            min_delay_ms: 2000,
            max_delay_ms: 2000,
            session_timeout_mins: 30,
            strict_codes: false,
            verbose: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        CoverageRate::new(self.fallback_rate)
            .map_err(|_| BenefitError::validation("fallback_rate", format!("{} is outside [0, 1]", self.fallback_rate)))?;
        if self.min_delay_ms > self.max_delay_ms {
            return Err(BenefitError::validation(
                "min_delay_ms",
                format!("{} exceeds max_delay_ms {}", self.min_delay_ms, self.max_delay_ms),
            ));
        }
        if self.session_timeout_mins <= 0 {
            return Err(BenefitError::validation("session_timeout_mins", "Session timeout must be positive"));
        }
        if self.session_timeout_mins > MAX_SESSION_TIMEOUT_MINS {
            return Err(BenefitError::validation(
                "session_timeout_mins",
                format!("{} exceeds the {} minute limit", self.session_timeout_mins, MAX_SESSION_TIMEOUT_MINS),
            ));
        }
        Ok(())
    }

    pub fn fallback(&self) -> Result<CoverageRate> {
        CoverageRate::new(self.fallback_rate)
    }

    pub fn session_timeout(&self) -> Result<Duration> {
        Duration::try_minutes(self.session_timeout_mins).ok_or_else(|| {
            BenefitError::validation(
                "session_timeout_mins",
                format!("{} minutes is not a representable duration", self.session_timeout_mins),
            )
        })
    }

    /// Roles allowed to run costing commands. Overriding the fee schedule is
    /// reserved for admins.
    pub fn required_roles(&self) -> &'static [Role] {
        if self.fee_schedule.is_some() {
            &[Role::Admin]
        } else {
            &[Role::Admin, Role::Staff]
        }
    }

    /// The configured fee schedule, or the built-in one when no file is given.
    pub fn load_fee_schedule(&self) -> Result<FeeSchedule> {
        match &self.fee_schedule {
            Some(path) => FeeSchedule::load(path),
            None => Ok(FeeSchedule::default()),
        }
    }
}
