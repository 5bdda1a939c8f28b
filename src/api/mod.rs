use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    GoalSolveConfig, GoalSolveResult, RetentionStrategy, SimulationInputs, SimulationResult,
    SolveParameter, aggregate, build_retention_curve, solve_goal,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRetentionStrategy {
    Linear,
    LogDecay,
}

impl From<CliRetentionStrategy> for RetentionStrategy {
    fn from(value: CliRetentionStrategy) -> Self {
        match value {
            CliRetentionStrategy::Linear => RetentionStrategy::Linear,
            CliRetentionStrategy::LogDecay => RetentionStrategy::LogDecay,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiRetentionStrategy {
    Linear,
    #[serde(alias = "logDecay", alias = "log_decay")]
    LogDecay,
}

impl From<ApiRetentionStrategy> for CliRetentionStrategy {
    fn from(value: ApiRetentionStrategy) -> Self {
        match value {
            ApiRetentionStrategy::Linear => CliRetentionStrategy::Linear,
            ApiRetentionStrategy::LogDecay => CliRetentionStrategy::LogDecay,
        }
    }
}

impl From<RetentionStrategy> for ApiRetentionStrategy {
    fn from(value: RetentionStrategy) -> Self {
        match value {
            RetentionStrategy::Linear => ApiRetentionStrategy::Linear,
            RetentionStrategy::LogDecay => ApiRetentionStrategy::LogDecay,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AnalysisMode {
    Simulate,
    GoalSeek,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiAnalysisMode {
    Simulate,
    #[serde(alias = "goalSeek", alias = "goal_seek")]
    GoalSeek,
}

impl From<ApiAnalysisMode> for AnalysisMode {
    fn from(value: ApiAnalysisMode) -> Self {
        match value {
            ApiAnalysisMode::Simulate => AnalysisMode::Simulate,
            ApiAnalysisMode::GoalSeek => AnalysisMode::GoalSeek,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ResponseMode {
    Simulate,
    GoalSeek,
}

impl From<AnalysisMode> for ResponseMode {
    fn from(value: AnalysisMode) -> Self {
        match value {
            AnalysisMode::Simulate => ResponseMode::Simulate,
            AnalysisMode::GoalSeek => ResponseMode::GoalSeek,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiSolveParameter {
    Ecpm,
    #[serde(alias = "d30Retention", alias = "d30_retention")]
    D30Retention,
    #[serde(alias = "sessionsPerDay", alias = "sessions_per_day")]
    SessionsPerDay,
    #[serde(alias = "iapConversion", alias = "iap_conversion")]
    IapConversion,
}

impl From<ApiSolveParameter> for SolveParameter {
    fn from(value: ApiSolveParameter) -> Self {
        match value {
            ApiSolveParameter::Ecpm => SolveParameter::EcpmUsd,
            ApiSolveParameter::D30Retention => SolveParameter::D30Retention,
            ApiSolveParameter::SessionsPerDay => SolveParameter::SessionsPerDay,
            ApiSolveParameter::IapConversion => SolveParameter::IapConversionRate,
        }
    }
}

impl From<SolveParameter> for ApiSolveParameter {
    fn from(value: SolveParameter) -> Self {
        match value {
            SolveParameter::EcpmUsd => ApiSolveParameter::Ecpm,
            SolveParameter::D30Retention => ApiSolveParameter::D30Retention,
            SolveParameter::SessionsPerDay => ApiSolveParameter::SessionsPerDay,
            SolveParameter::IapConversionRate => ApiSolveParameter::IapConversion,
        }
    }
}

/// Wire payload for `/api/simulate`. Retention, IAP conversion and target
/// ROAS arrive in percent, matching the slider UI; goal-seek search bounds
/// use the same unit as the parameter they bound.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    cpi: Option<f64>,
    d1_retention: Option<f64>,
    d7_retention: Option<f64>,
    d30_retention: Option<f64>,
    sessions_per_day: Option<f64>,
    ads_per_session: Option<f64>,
    ecpm: Option<f64>,
    iap_conversion: Option<f64>,
    avg_iap: Option<f64>,
    strategy: Option<ApiRetentionStrategy>,

    analysis_mode: Option<ApiAnalysisMode>,
    goal_parameter: Option<ApiSolveParameter>,
    target_roas: Option<f64>,
    goal_search_min: Option<f64>,
    goal_search_max: Option<f64>,
    goal_tolerance: Option<f64>,
    goal_max_iterations: Option<u32>,
}

#[derive(Parser, Debug)]
#[command(
    name = "ltvsim",
    about = "Mobile game LTV / ROAS what-if estimator (30-day retention curve + IAA/IAP revenue)"
)]
struct Cli {
    #[arg(long, default_value_t = 0.20, help = "Cost per install in USD")]
    cpi: f64,
    #[arg(long, default_value_t = 15.0, help = "D1 retention in percent")]
    d1_retention: f64,
    #[arg(long, default_value_t = 6.0, help = "D7 retention in percent")]
    d7_retention: f64,
    #[arg(long, default_value_t = 3.0, help = "D30 retention in percent")]
    d30_retention: f64,
    #[arg(
        long,
        default_value_t = 8.0,
        help = "Average daily sessions per active user (typical 5-6, heavy users 8-12)"
    )]
    sessions_per_day: f64,
    #[arg(
        long,
        default_value_t = 2.5,
        help = "Ad views per session (rewarded + interstitial)"
    )]
    ads_per_session: f64,
    #[arg(
        long,
        default_value_t = 3.5,
        help = "Ad eCPM in USD per 1000 impressions"
    )]
    ecpm: f64,
    #[arg(long, default_value_t = 1.5, help = "IAP conversion rate in percent")]
    iap_conversion: f64,
    #[arg(
        long,
        default_value_t = 4.5,
        help = "Average purchase amount per converting user in USD"
    )]
    avg_iap: f64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliRetentionStrategy::Linear,
        help = "Retention curve strategy: piecewise-linear through D1/D7/D30, or log decay anchored at D1/D30"
    )]
    retention_strategy: CliRetentionStrategy,
}

#[derive(Copy, Clone, Debug)]
struct GoalOptions {
    parameter: SolveParameter,
    target_roas_percent: f64,
    search_min: f64,
    search_max: f64,
    tolerance: f64,
    max_iterations: u32,
}

#[derive(Copy, Clone, Debug)]
struct ApiOptions {
    mode: AnalysisMode,
    goal: Option<GoalOptions>,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: SimulationInputs,
    options: ApiOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoalIterationResponse {
    iteration: u32,
    candidate_value: f64,
    roas_percent: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoalSeekResponse {
    parameter: ApiSolveParameter,
    target_roas_percent: f64,
    solved_value: Option<f64>,
    achieved_roas_percent: Option<f64>,
    converged: bool,
    feasible: bool,
    message: String,
    iterations: Vec<GoalIterationResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    mode: ResponseMode,
    strategy: ApiRetentionStrategy,
    daily_iaa_revenue: f64,
    ltv_iaa: f64,
    ltv_iap: f64,
    total_ltv: f64,
    roas_percent: f64,
    retention_curve: Vec<f64>,
    cumulative_ltv: Vec<f64>,
    goal: Option<GoalSeekResponse>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: Cli) -> Result<SimulationInputs, String> {
    if !cli.cpi.is_finite() || cli.cpi <= 0.0 {
        return Err("--cpi must be > 0".to_string());
    }

    for (name, value) in [
        ("--d1-retention", cli.d1_retention),
        ("--d7-retention", cli.d7_retention),
        ("--d30-retention", cli.d30_retention),
        ("--iap-conversion", cli.iap_conversion),
    ] {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }

    if !cli.sessions_per_day.is_finite() || cli.sessions_per_day <= 0.0 {
        return Err("--sessions-per-day must be > 0".to_string());
    }

    for (name, value) in [
        ("--ads-per-session", cli.ads_per_session),
        ("--ecpm", cli.ecpm),
        ("--avg-iap", cli.avg_iap),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    Ok(SimulationInputs {
        cpi: cli.cpi,
        d1_retention: cli.d1_retention / 100.0,
        d7_retention: cli.d7_retention / 100.0,
        d30_retention: cli.d30_retention / 100.0,
        sessions_per_day: cli.sessions_per_day,
        ads_per_session: cli.ads_per_session,
        ecpm_usd: cli.ecpm,
        iap_conversion_rate: cli.iap_conversion / 100.0,
        avg_iap_usd: cli.avg_iap,
        strategy: cli.retention_strategy.into(),
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("LTV simulator HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let inputs = &request.inputs;
    let curve = match build_retention_curve(
        inputs.d1_retention,
        inputs.d7_retention,
        inputs.d30_retention,
        inputs.strategy,
    ) {
        Ok(curve) => curve,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let result = match aggregate(&curve, inputs) {
        Ok(result) => result,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let goal = match request.options.mode {
        AnalysisMode::Simulate => None,
        AnalysisMode::GoalSeek => {
            let options = request.options.goal.expect("goal-seek mode carries goal");
            let config = GoalSolveConfig {
                parameter: options.parameter,
                target_roas_percent: options.target_roas_percent,
                search_min: options.search_min,
                search_max: options.search_max,
                tolerance: options.tolerance,
                max_iterations: options.max_iterations,
            };
            match solve_goal(inputs, config) {
                Ok(solve) => Some(build_goal_response(solve)),
                Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
            }
        }
    };

    let response = build_simulate_response(
        inputs,
        &result,
        curve.daily_values().to_vec(),
        request.options.mode,
        goal,
    );
    json_response(StatusCode::OK, response)
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.cpi {
        cli.cpi = v;
    }
    if let Some(v) = payload.d1_retention {
        cli.d1_retention = v;
    }
    if let Some(v) = payload.d7_retention {
        cli.d7_retention = v;
    }
    if let Some(v) = payload.d30_retention {
        cli.d30_retention = v;
    }
    if let Some(v) = payload.sessions_per_day {
        cli.sessions_per_day = v;
    }
    if let Some(v) = payload.ads_per_session {
        cli.ads_per_session = v;
    }
    if let Some(v) = payload.ecpm {
        cli.ecpm = v;
    }
    if let Some(v) = payload.iap_conversion {
        cli.iap_conversion = v;
    }
    if let Some(v) = payload.avg_iap {
        cli.avg_iap = v;
    }
    if let Some(v) = payload.strategy {
        cli.retention_strategy = v.into();
    }

    let mode = payload
        .analysis_mode
        .map(AnalysisMode::from)
        .unwrap_or(AnalysisMode::Simulate);

    let inputs = build_inputs(cli)?;

    let goal = match mode {
        AnalysisMode::Simulate => None,
        AnalysisMode::GoalSeek => {
            let parameter: SolveParameter = payload
                .goal_parameter
                .unwrap_or(ApiSolveParameter::Ecpm)
                .into();
            let (default_min, default_max) = default_goal_bounds(parameter);
            let search_min = payload.goal_search_min.unwrap_or(default_min);
            let search_max = payload.goal_search_max.unwrap_or(default_max);
            Some(GoalOptions {
                parameter,
                target_roas_percent: payload.target_roas.unwrap_or(100.0),
                search_min: goal_value_to_core(parameter, search_min),
                search_max: goal_value_to_core(parameter, search_max),
                tolerance: payload.goal_tolerance.unwrap_or(1e-6),
                max_iterations: payload.goal_max_iterations.unwrap_or(60),
            })
        }
    };

    Ok(ApiRequest {
        inputs,
        options: ApiOptions { mode, goal },
    })
}

/// Payload-side search bounds, in the same unit as the payload field for the
/// parameter (percent for the fraction parameters).
fn default_goal_bounds(parameter: SolveParameter) -> (f64, f64) {
    match parameter {
        SolveParameter::EcpmUsd => (0.0, 20.0),
        SolveParameter::D30Retention => (0.0, 100.0),
        SolveParameter::SessionsPerDay => (0.5, 24.0),
        SolveParameter::IapConversionRate => (0.0, 100.0),
    }
}

fn goal_value_to_core(parameter: SolveParameter, value: f64) -> f64 {
    match parameter {
        SolveParameter::D30Retention | SolveParameter::IapConversionRate => value / 100.0,
        SolveParameter::EcpmUsd | SolveParameter::SessionsPerDay => value,
    }
}

fn goal_value_to_payload(parameter: SolveParameter, value: f64) -> f64 {
    match parameter {
        SolveParameter::D30Retention | SolveParameter::IapConversionRate => value * 100.0,
        SolveParameter::EcpmUsd | SolveParameter::SessionsPerDay => value,
    }
}

fn default_cli_for_api() -> Cli {
    Cli {
        cpi: 0.20,
        d1_retention: 15.0,
        d7_retention: 6.0,
        d30_retention: 3.0,
        sessions_per_day: 8.0,
        ads_per_session: 2.5,
        ecpm: 3.5,
        iap_conversion: 1.5,
        avg_iap: 4.5,
        retention_strategy: CliRetentionStrategy::Linear,
    }
}

fn build_goal_response(solve: GoalSolveResult) -> GoalSeekResponse {
    let parameter = solve.parameter;
    GoalSeekResponse {
        parameter: parameter.into(),
        target_roas_percent: solve.target_roas_percent,
        solved_value: solve
            .solved_value
            .map(|v| goal_value_to_payload(parameter, v)),
        achieved_roas_percent: solve.achieved_roas_percent,
        converged: solve.converged,
        feasible: solve.feasible,
        message: solve.message,
        iterations: solve
            .iterations
            .into_iter()
            .map(|it| GoalIterationResponse {
                iteration: it.iteration,
                candidate_value: goal_value_to_payload(parameter, it.candidate_value),
                roas_percent: it.roas_percent,
            })
            .collect(),
    }
}

fn build_simulate_response(
    inputs: &SimulationInputs,
    result: &SimulationResult,
    retention_curve: Vec<f64>,
    mode: AnalysisMode,
    goal: Option<GoalSeekResponse>,
) -> SimulateResponse {
    SimulateResponse {
        mode: mode.into(),
        strategy: inputs.strategy.into(),
        daily_iaa_revenue: result.daily_iaa_revenue,
        ltv_iaa: result.ltv_iaa,
        ltv_iap: result.ltv_iap,
        total_ltv: result.total_ltv,
        roas_percent: result.roas_percent,
        retention_curve,
        cumulative_ltv: result.cumulative_ltv.clone(),
        goal,
    }
}
