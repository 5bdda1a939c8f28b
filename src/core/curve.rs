use super::types::{HORIZON_DAYS, RetentionCurve, RetentionStrategy, SimulationError};

/// Builds the daily retention curve for days 1..=30 from the three sampled
/// anchors. Anchors outside [0,1] are rejected; the post-interpolation clamp
/// below is curve-construction policy, not input validation.
pub fn build_retention_curve(
    d1: f64,
    d7: f64,
    d30: f64,
    strategy: RetentionStrategy,
) -> Result<RetentionCurve, SimulationError> {
    for (name, value) in [("d1", d1), ("d7", d7), ("d30", d30)] {
        check_fraction(name, value)?;
    }

    let values = match strategy {
        RetentionStrategy::Linear => (1..=HORIZON_DAYS)
            .map(|day| piecewise_linear(day as f64, d1, d7, d30).clamp(0.0, 1.0))
            .collect(),
        RetentionStrategy::LogDecay => {
            let lo = d1.min(d30);
            let hi = d1.max(d30);
            (1..=HORIZON_DAYS)
                .map(|day| log_decay(day as f64, d1, d30).clamp(lo, hi))
                .collect()
        }
    };

    Ok(RetentionCurve::from_daily_values(values))
}

/// Piecewise-linear through (1, d1), (7, d7), (30, d30); day values outside
/// [1, 30] extrapolate along the nearest segment's slope.
fn piecewise_linear(day: f64, d1: f64, d7: f64, d30: f64) -> f64 {
    if day <= 7.0 {
        d1 + (day - 1.0) * (d7 - d1) / 6.0
    } else {
        d7 + (day - 7.0) * (d30 - d7) / 23.0
    }
}

/// Logarithmic decay anchored at day 1 (= d1) and day 30 (= d30). A zero d1
/// would divide by zero in the d30/d1 ratio; the curve is defined as all
/// zeros in that case.
fn log_decay(day: f64, d1: f64, d30: f64) -> f64 {
    if d1 <= 0.0 {
        return 0.0;
    }
    d1 * (1.0 - day.ln() / 30f64.ln() * (1.0 - d30 / d1))
}

fn check_fraction(name: &str, value: f64) -> Result<(), SimulationError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(SimulationError::InvalidInput(format!(
            "{name} retention must be a fraction between 0 and 1, got {value}"
        )));
    }
    Ok(())
}
