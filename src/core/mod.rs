mod curve;
mod engine;
mod solver;
mod types;

pub use curve::build_retention_curve;
pub use engine::{aggregate, evaluate};
pub use solver::{GoalSolveConfig, GoalSolveIteration, GoalSolveResult, SolveParameter, solve_goal};
pub use types::{
    HORIZON_DAYS, RetentionCurve, RetentionStrategy, SimulationError, SimulationInputs,
    SimulationResult,
};
