use std::fmt;

use serde::Serialize;

/// Number of daily retention samples produced per evaluation (days 1..=30).
pub const HORIZON_DAYS: usize = 30;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RetentionStrategy {
    Linear,
    LogDecay,
}

/// One evaluation's worth of marketing and monetization assumptions.
///
/// Retention and conversion fields are fractions in [0,1]; dollar fields are
/// plain USD amounts. Unit conversion from the percent-denominated UI surface
/// happens in the API layer, never here.
#[derive(Debug, Clone)]
pub struct SimulationInputs {
    pub cpi: f64,
    pub d1_retention: f64,
    pub d7_retention: f64,
    pub d30_retention: f64,
    pub sessions_per_day: f64,
    pub ads_per_session: f64,
    pub ecpm_usd: f64,
    pub iap_conversion_rate: f64,
    pub avg_iap_usd: f64,
    pub strategy: RetentionStrategy,
}

/// Daily retention fractions for days 1..=30, clamped per strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RetentionCurve {
    values: Vec<f64>,
}

impl RetentionCurve {
    pub(crate) fn from_daily_values(values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), HORIZON_DAYS);
        Self { values }
    }

    /// Retention fraction on `day`, 1-based. Panics outside 1..=30.
    pub fn value_on(&self, day: usize) -> f64 {
        self.values[day - 1]
    }

    pub fn daily_values(&self) -> &[f64] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub daily_iaa_revenue: f64,
    pub ltv_iaa: f64,
    pub ltv_iap: f64,
    pub total_ltv: f64,
    pub roas_percent: f64,
    pub cumulative_ltv: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    InvalidInput(String),
    DivisionByZero,
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            SimulationError::DivisionByZero => {
                write!(f, "ROAS is undefined when CPI is zero")
            }
        }
    }
}

impl std::error::Error for SimulationError {}
