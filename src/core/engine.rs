use super::curve::build_retention_curve;
use super::types::{
    HORIZON_DAYS, RetentionCurve, SimulationError, SimulationInputs, SimulationResult,
};

/// Full evaluation: build the retention curve for `inputs.strategy`, then
/// aggregate revenue over it. Pure; identical inputs give identical results.
pub fn evaluate(inputs: &SimulationInputs) -> Result<SimulationResult, SimulationError> {
    let curve = build_retention_curve(
        inputs.d1_retention,
        inputs.d7_retention,
        inputs.d30_retention,
        inputs.strategy,
    )?;
    aggregate(&curve, inputs)
}

/// Folds a retention curve and the monetization assumptions into the headline
/// figures and the cumulative IAA LTV series.
pub fn aggregate(
    curve: &RetentionCurve,
    inputs: &SimulationInputs,
) -> Result<SimulationResult, SimulationError> {
    validate_revenue_inputs(inputs)?;

    let daily_iaa_revenue =
        inputs.sessions_per_day * inputs.ads_per_session * (inputs.ecpm_usd / 1000.0);

    let mut cumulative_ltv = Vec::with_capacity(HORIZON_DAYS);
    let mut running = 0.0;
    for &retained in curve.daily_values() {
        running += retained * daily_iaa_revenue;
        cumulative_ltv.push(running);
    }
    let ltv_iaa = running;

    let ltv_iap = inputs.iap_conversion_rate * inputs.avg_iap_usd;
    let total_ltv = ltv_iaa + ltv_iap;

    if inputs.cpi == 0.0 {
        return Err(SimulationError::DivisionByZero);
    }
    let roas_percent = total_ltv / inputs.cpi * 100.0;

    Ok(SimulationResult {
        daily_iaa_revenue,
        ltv_iaa,
        ltv_iap,
        total_ltv,
        roas_percent,
        cumulative_ltv,
    })
}

fn validate_revenue_inputs(inputs: &SimulationInputs) -> Result<(), SimulationError> {
    if !inputs.cpi.is_finite() || inputs.cpi < 0.0 {
        return Err(SimulationError::InvalidInput(format!(
            "cpi must be a finite value >= 0, got {}",
            inputs.cpi
        )));
    }
    if !inputs.sessions_per_day.is_finite() || inputs.sessions_per_day <= 0.0 {
        return Err(SimulationError::InvalidInput(format!(
            "sessions per day must be > 0, got {}",
            inputs.sessions_per_day
        )));
    }
    for (name, value) in [
        ("ads per session", inputs.ads_per_session),
        ("ad eCPM", inputs.ecpm_usd),
        ("average IAP amount", inputs.avg_iap_usd),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(SimulationError::InvalidInput(format!(
                "{name} must be a finite value >= 0, got {value}"
            )));
        }
    }
    if !inputs.iap_conversion_rate.is_finite() || !(0.0..=1.0).contains(&inputs.iap_conversion_rate)
    {
        return Err(SimulationError::InvalidInput(format!(
            "IAP conversion rate must be a fraction between 0 and 1, got {}",
            inputs.iap_conversion_rate
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RetentionStrategy;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    // Scenario from the original tool's defaults.
    fn sample_inputs() -> SimulationInputs {
        SimulationInputs {
            cpi: 0.20,
            d1_retention: 0.15,
            d7_retention: 0.06,
            d30_retention: 0.03,
            sessions_per_day: 8.0,
            ads_per_session: 2.5,
            ecpm_usd: 3.5,
            iap_conversion_rate: 0.015,
            avg_iap_usd: 4.5,
            strategy: RetentionStrategy::Linear,
        }
    }

    #[test]
    fn linear_scenario_headline_figures() {
        let result = evaluate(&sample_inputs()).expect("valid inputs");

        // daily = 8 * 2.5 * (3.5 / 1000); curve sums to 1.755 over 30 days.
        assert_approx(result.daily_iaa_revenue, 0.07);
        assert_approx(result.ltv_iaa, 0.12285);
        assert_approx(result.ltv_iap, 0.0675);
        assert_approx(result.total_ltv, 0.19035);
        assert_approx(result.roas_percent, 95.175);
    }

    #[test]
    fn cumulative_series_is_prefix_sum_of_daily_revenue() {
        let result = evaluate(&sample_inputs()).expect("valid inputs");
        assert_eq!(result.cumulative_ltv.len(), HORIZON_DAYS);
        assert_approx(result.cumulative_ltv[0], 0.15 * 0.07);
        assert_eq!(*result.cumulative_ltv.last().expect("30 values"), result.ltv_iaa);
        for pair in result.cumulative_ltv.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn total_ltv_is_sum_of_iaa_and_iap() {
        let result = evaluate(&sample_inputs()).expect("valid inputs");
        assert_eq!(result.total_ltv, result.ltv_iaa + result.ltv_iap);
    }

    #[test]
    fn roas_of_known_ltv() {
        // No ad revenue; a 50% conversion at $3 gives exactly 1.5 LTV.
        let mut inputs = sample_inputs();
        inputs.ads_per_session = 0.0;
        inputs.iap_conversion_rate = 0.5;
        inputs.avg_iap_usd = 3.0;

        let result = evaluate(&inputs).expect("valid inputs");
        assert_approx(result.total_ltv, 1.5);
        assert_approx(result.roas_percent, 750.0);
    }

    #[test]
    fn log_decay_with_zero_d1_produces_zero_iaa_ltv() {
        let mut inputs = sample_inputs();
        inputs.strategy = RetentionStrategy::LogDecay;
        inputs.d1_retention = 0.0;

        let result = evaluate(&inputs).expect("zero d1 is in-domain");
        assert_eq!(result.ltv_iaa, 0.0);
        assert!(result.cumulative_ltv.iter().all(|&v| v == 0.0));
        assert_eq!(result.total_ltv, result.ltv_iap);
        assert!(result.roas_percent.is_finite());
    }

    #[test]
    fn zero_cpi_fails_with_division_by_zero() {
        let mut inputs = sample_inputs();
        inputs.cpi = 0.0;
        assert_eq!(
            evaluate(&inputs).expect_err("must fail"),
            SimulationError::DivisionByZero
        );
    }

    #[test]
    fn negative_cpi_is_invalid_input() {
        let mut inputs = sample_inputs();
        inputs.cpi = -0.1;
        assert!(matches!(
            evaluate(&inputs).expect_err("must fail"),
            SimulationError::InvalidInput(_)
        ));
    }

    #[test]
    fn zero_sessions_per_day_is_invalid_input() {
        let mut inputs = sample_inputs();
        inputs.sessions_per_day = 0.0;
        assert!(matches!(
            evaluate(&inputs).expect_err("must fail"),
            SimulationError::InvalidInput(ref msg) if msg.contains("sessions")
        ));
    }

    #[test]
    fn out_of_range_conversion_rate_is_invalid_input() {
        let mut inputs = sample_inputs();
        inputs.iap_conversion_rate = 1.5;
        assert!(matches!(
            evaluate(&inputs).expect_err("must fail"),
            SimulationError::InvalidInput(ref msg) if msg.contains("conversion")
        ));
    }

    #[test]
    fn non_finite_ecpm_is_invalid_input() {
        let mut inputs = sample_inputs();
        inputs.ecpm_usd = f64::INFINITY;
        assert!(matches!(
            evaluate(&inputs).expect_err("must fail"),
            SimulationError::InvalidInput(_)
        ));
    }

    #[test]
    fn evaluation_is_bit_identical_across_calls() {
        let inputs = sample_inputs();
        let a = evaluate(&inputs).expect("valid inputs");
        let b = evaluate(&inputs).expect("valid inputs");
        assert_eq!(a.roas_percent.to_bits(), b.roas_percent.to_bits());
        assert_eq!(a.total_ltv.to_bits(), b.total_ltv.to_bits());
        assert_eq!(a, b);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(200))]

        #[test]
        fn prop_result_invariants_hold_for_valid_inputs(
            cpi in 0.01f64..10.0,
            d1 in 0.0f64..=1.0,
            d7 in 0.0f64..=1.0,
            d30 in 0.0f64..=1.0,
            sessions in 0.1f64..24.0,
            ads in 0.0f64..=5.0,
            ecpm in 0.0f64..=20.0,
            iap_conversion in 0.0f64..=1.0,
            avg_iap in 0.0f64..=50.0,
            log_decay in proptest::bool::ANY,
        ) {
            let inputs = SimulationInputs {
                cpi,
                d1_retention: d1,
                d7_retention: d7,
                d30_retention: d30,
                sessions_per_day: sessions,
                ads_per_session: ads,
                ecpm_usd: ecpm,
                iap_conversion_rate: iap_conversion,
                avg_iap_usd: avg_iap,
                strategy: if log_decay {
                    RetentionStrategy::LogDecay
                } else {
                    RetentionStrategy::Linear
                },
            };
            let result = evaluate(&inputs).unwrap();

            prop_assert_eq!(result.total_ltv, result.ltv_iaa + result.ltv_iap);
            prop_assert_eq!(result.cumulative_ltv.len(), HORIZON_DAYS);
            prop_assert!(result.daily_iaa_revenue >= 0.0);
            prop_assert!(result.roas_percent.is_finite());
            let mut prev = 0.0;
            for &v in &result.cumulative_ltv {
                prop_assert!(v.is_finite());
                prop_assert!(v >= prev);
                prev = v;
            }
        }
    }
}
