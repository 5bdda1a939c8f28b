use super::engine::evaluate;
use super::types::{SimulationError, SimulationInputs};

/// Input parameter a goal-seek may vary. ROAS is monotone non-decreasing in
/// each of these, which is what makes bisection sound.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SolveParameter {
    EcpmUsd,
    D30Retention,
    SessionsPerDay,
    IapConversionRate,
}

#[derive(Debug, Clone, Copy)]
pub struct GoalSolveConfig {
    pub parameter: SolveParameter,
    pub target_roas_percent: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub roas_percent: f64,
}

#[derive(Debug, Clone)]
pub struct GoalSolveResult {
    pub parameter: SolveParameter,
    pub target_roas_percent: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub solved_value: Option<f64>,
    pub achieved_roas_percent: Option<f64>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Finds the smallest value of `config.parameter` within the search range
/// whose ROAS meets `config.target_roas_percent`, by bisection. Infeasible
/// ranges are reported in the result rather than returned as errors.
pub fn solve_goal(
    inputs: &SimulationInputs,
    config: GoalSolveConfig,
) -> Result<GoalSolveResult, SimulationError> {
    validate_config(config)?;

    let low_roas = roas_with(inputs, config.parameter, config.search_min)?;
    let high_roas = roas_with(inputs, config.parameter, config.search_max)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_roas + 1e-12 >= config.target_roas_percent {
        solved_value = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Already meets the target ROAS at the lower search bound.".to_string();
    } else if high_roas + 1e-12 < config.target_roas_percent {
        feasible = false;
        message = "Target ROAS is not reachable within the search bounds.".to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let roas = roas_with(inputs, config.parameter, mid)?;
            iterations.push(GoalSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_value: mid,
                roas_percent: roas,
            });

            if roas + 1e-12 >= config.target_roas_percent {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                solved_value = Some(hi);
                break;
            }
        }
        if solved_value.is_none() {
            solved_value = Some(hi);
        }
        feasible = true;
        message = if converged {
            "Solved the target ROAS.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
    }

    let achieved_roas_percent = match solved_value {
        Some(value) => Some(roas_with(inputs, config.parameter, value)?),
        None => None,
    };

    Ok(GoalSolveResult {
        parameter: config.parameter,
        target_roas_percent: config.target_roas_percent,
        search_min: config.search_min,
        search_max: config.search_max,
        solved_value,
        achieved_roas_percent,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn roas_with(
    base_inputs: &SimulationInputs,
    parameter: SolveParameter,
    value: f64,
) -> Result<f64, SimulationError> {
    let mut inputs = base_inputs.clone();
    match parameter {
        SolveParameter::EcpmUsd => inputs.ecpm_usd = value,
        SolveParameter::D30Retention => inputs.d30_retention = value,
        SolveParameter::SessionsPerDay => inputs.sessions_per_day = value,
        SolveParameter::IapConversionRate => inputs.iap_conversion_rate = value,
    }
    Ok(evaluate(&inputs)?.roas_percent)
}

fn validate_config(config: GoalSolveConfig) -> Result<(), SimulationError> {
    if !config.target_roas_percent.is_finite() || config.target_roas_percent < 0.0 {
        return Err(SimulationError::InvalidInput(
            "target ROAS must be a finite value >= 0".to_string(),
        ));
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(SimulationError::InvalidInput(
            "search bounds must be finite".to_string(),
        ));
    }
    if config.search_max <= config.search_min {
        return Err(SimulationError::InvalidInput(
            "search max must be greater than search min".to_string(),
        ));
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(SimulationError::InvalidInput(
            "tolerance must be > 0".to_string(),
        ));
    }
    if config.max_iterations == 0 {
        return Err(SimulationError::InvalidInput(
            "max iterations must be > 0".to_string(),
        ));
    }
    match config.parameter {
        SolveParameter::D30Retention | SolveParameter::IapConversionRate => {
            if config.search_min < 0.0 || config.search_max > 1.0 {
                return Err(SimulationError::InvalidInput(
                    "search bounds for a fraction parameter must lie within [0, 1]".to_string(),
                ));
            }
        }
        SolveParameter::SessionsPerDay => {
            if config.search_min <= 0.0 {
                return Err(SimulationError::InvalidInput(
                    "search min for sessions per day must be > 0".to_string(),
                ));
            }
        }
        SolveParameter::EcpmUsd => {
            if config.search_min < 0.0 {
                return Err(SimulationError::InvalidInput(
                    "search min for eCPM must be >= 0".to_string(),
                ));
            }
        }
    }
    Ok(())
}
