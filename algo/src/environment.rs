//! Trading environment
//!
//! Simulation-wide settings: the simulated period, starting capital, the
//! exchange time zone and the risk-free rate used by the risk metrics.

use crate::error::{AlgoError, AlgoResult};
use crate::types::Sid;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Default starting capital
pub const DEFAULT_CAPITAL_BASE: f64 = 100_000.0;

/// Settings shared by every component of one simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingEnvironment {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub capital_base: f64,
    /// Exchange-local time zone used for scheduling
    pub exchange_tz: Tz,
    /// Annual risk-free rate
    pub risk_free_rate: f64,
    /// Sid whose price series serves as benchmark
    pub benchmark_sid: Option<Sid>,
}

impl TradingEnvironment {
    /// Convert a UTC timestamp to exchange-local time
    pub fn exchange_time(&self, dt: DateTime<Utc>) -> DateTime<Tz> {
        dt.with_timezone(&self.exchange_tz)
    }

    pub fn with_capital_base(mut self, capital_base: f64) -> Self {
        self.capital_base = capital_base;
        self
    }

    pub fn with_benchmark(mut self, sid: Option<Sid>) -> Self {
        self.benchmark_sid = sid;
        self
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }
}

/// Build an environment for `[start, end]` with default settings
pub fn create_trading_environment(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AlgoResult<TradingEnvironment> {
    if start > end {
        return Err(AlgoError::InvalidParameter(format!(
            "Period start {} is after period end {}",
            start, end
        )));
    }

    Ok(TradingEnvironment {
        period_start: start,
        period_end: end,
        capital_base: DEFAULT_CAPITAL_BASE,
        exchange_tz: chrono_tz::US::Eastern,
        risk_free_rate: 0.0,
        benchmark_sid: None,
    })
}
