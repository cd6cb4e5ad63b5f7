use axum::{
    Router,
    extract::{
        Json, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::core::{
    ContributionRange, EngineError, ErrorKind, FamilyMemberData, IntegrationFilters, IsrBreakdown,
    MAX_RETIREMENT_AGE, MIN_RETIREMENT_AGE, MonthsMode, MonthsWindow, OptimalStart,
    ProjectionConfig, ProjectionYear, SortKey, StrategyKind, StrategyResult, TableError, Tables,
    TargetSolveConfig, TargetSolveResult, ValidationError, YearMonth, calculate_strategies, isr,
    max_months_m40, optimal_start_date, project, salary_to_sdi, sdi_to_uma_multiple,
    solve_target_pension, top_n,
};

const MAX_PROJECTION_YEARS: u32 = 100;
const CALENDAR_YEARS: std::ops::RangeInclusive<i32> = 1900..=2200;

#[derive(Parser, Debug)]
#[command(
    name = "modalidad40",
    version,
    about = "Modalidad 40 strategy calculator for IMSS Ley 73 pensions"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the JSON HTTP API.
    Serve(ServeArgs),
    /// Calculate strategies for one request read from a file or stdin.
    Calculate(CalculateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(short, long, env = "M40_PORT", default_value_t = 8080)]
    pub port: u16,
    #[arg(long, env = "M40_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,
    #[arg(
        long,
        env = "M40_TABLES",
        help = "JSON file replacing the built-in UMA, wage, rate and tax tables"
    )]
    pub tables: Option<PathBuf>,
    #[command(flatten)]
    pub defaults: ScanDefaults,
}

#[derive(Args, Debug, Clone)]
pub struct CalculateArgs {
    #[arg(long, help = "Request JSON file; stdin when omitted")]
    pub input: Option<PathBuf>,
    #[arg(long, env = "M40_TABLES")]
    pub tables: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
    #[command(flatten)]
    pub defaults: ScanDefaults,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliSortKey {
    PensionDesc,
    PensionAsc,
    InversionAsc,
    InversionDesc,
    RoiDesc,
    RecoveryAsc,
    MonthsAsc,
    MonthsDesc,
    UmaAsc,
    UmaDesc,
}

impl From<CliSortKey> for SortKey {
    fn from(value: CliSortKey) -> Self {
        match value {
            CliSortKey::PensionDesc => SortKey::PensionDesc,
            CliSortKey::PensionAsc => SortKey::PensionAsc,
            CliSortKey::InversionAsc => SortKey::InversionAsc,
            CliSortKey::InversionDesc => SortKey::InversionDesc,
            CliSortKey::RoiDesc => SortKey::RoiDesc,
            CliSortKey::RecoveryAsc => SortKey::RecoveryAsc,
            CliSortKey::MonthsAsc => SortKey::MonthsAsc,
            CliSortKey::MonthsDesc => SortKey::MonthsDesc,
            CliSortKey::UmaAsc => SortKey::UmaAsc,
            CliSortKey::UmaDesc => SortKey::UmaDesc,
        }
    }
}

/// Values used when a request leaves a filter out.
#[derive(Args, Debug, Clone)]
pub struct ScanDefaults {
    #[arg(long, default_value_t = 65)]
    pub retirement_age: u32,
    #[arg(long, default_value_t = 0.0, help = "Lowest monthly M40 payment in MXN")]
    pub min_contribution: f64,
    #[arg(
        long,
        default_value_t = 100_000.0,
        help = "Highest monthly M40 payment in MXN"
    )]
    pub max_contribution: f64,
    #[arg(long, value_enum, value_delimiter = ',')]
    pub sort_by: Vec<CliSortKey>,
    #[arg(long, help = "Return only the best N strategies")]
    pub limit: Option<usize>,
}

impl Default for ScanDefaults {
    fn default() -> Self {
        Self {
            retirement_age: 65,
            min_contribution: 0.0,
            max_contribution: 100_000.0,
            sort_by: Vec::new(),
            limit: None,
        }
    }
}

fn validate_defaults(defaults: &ScanDefaults) -> Result<(), String> {
    if !(MIN_RETIREMENT_AGE..=MAX_RETIREMENT_AGE).contains(&defaults.retirement_age) {
        return Err("--retirement-age must be between 60 and 65".to_string());
    }
    if !defaults.min_contribution.is_finite() || defaults.min_contribution < 0.0 {
        return Err("--min-contribution must be >= 0".to_string());
    }
    if !defaults.max_contribution.is_finite()
        || defaults.max_contribution <= defaults.min_contribution
    {
        return Err("--max-contribution must be > --min-contribution".to_string());
    }
    if defaults.limit == Some(0) {
        return Err("--limit must be > 0".to_string());
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Tables(#[from] TableError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid request JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Clone)]
pub struct AppState {
    tables: Arc<Tables>,
    defaults: Arc<ScanDefaults>,
}

impl AppState {
    pub fn new(tables: Tables, defaults: ScanDefaults) -> Self {
        Self {
            tables: Arc::new(tables),
            defaults: Arc::new(defaults),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FiltersPayload {
    monthly_contribution_range: Option<ContributionRange>,
    months: Option<u32>,
    months_mode: Option<MonthsMode>,
    retirement_age: Option<u32>,
    start_month: Option<u32>,
    start_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalculatePayload {
    family_data: FamilyMemberData,
    #[serde(default)]
    filters: FiltersPayload,
    #[serde(default)]
    sort_by: Option<Vec<SortKey>>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IsrPayload {
    pension_mensual: f64,
    year: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionPayload {
    pension_inicial: f64,
    years: Option<u32>,
    incremento_anual: Option<f64>,
    anio_inicio: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptimalStartQuery {
    birth_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaxMonthsQuery {
    birth_date: NaiveDate,
    retirement_age: Option<u32>,
    start_month: u32,
    start_year: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolveTargetPayload {
    family_data: FamilyMemberData,
    #[serde(default)]
    filters: FiltersPayload,
    months: u32,
    estrategia: StrategyKind,
    target_pension: f64,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

#[derive(Debug)]
struct StrategyRequest {
    member: FamilyMemberData,
    filters: IntegrationFilters,
    sort: Vec<SortKey>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategiesResponse {
    strategies: Vec<StrategyResult>,
    total_candidates: usize,
    sdi_actual: f64,
    uma_actual: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    no_results: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProjectionResponse {
    years: Vec<ProjectionYear>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

#[derive(Debug)]
enum ApiError {
    Engine(EngineError),
    BadRequest(String),
    NotFound,
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Engine(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid JSON payload: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Engine(err) => {
                let code = match &err {
                    EngineError::Validation(v) => Some(v.code()),
                    _ => None,
                };
                let status = match err.kind() {
                    ErrorKind::InvalidInput => {
                        warn!(error = %err, "rejected request");
                        StatusCode::BAD_REQUEST
                    }
                    ErrorKind::NoResults => {
                        info!(reason = %err, "no results for request");
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    ErrorKind::Internal => {
                        error!(error = %err, "calculation failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                error_response(status, err.to_string(), err.kind(), code)
            }
            ApiError::BadRequest(msg) => {
                warn!(error = %msg, "rejected request");
                error_response(StatusCode::BAD_REQUEST, msg, ErrorKind::InvalidInput, None)
            }
            ApiError::NotFound => error_response(
                StatusCode::NOT_FOUND,
                "Not found".to_string(),
                ErrorKind::InvalidInput,
                None,
            ),
        }
    }
}

fn load_tables(path: Option<&Path>) -> Result<Tables, TableError> {
    match path {
        Some(path) => {
            let tables = Tables::from_path(path)?;
            info!(path = %path.display(), "loaded statutory tables");
            Ok(tables)
        }
        None => Ok(Tables::official()),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/calculate-strategies", post(calculate_handler))
        .route("/api/isr", post(isr_handler))
        .route("/api/projection", post(projection_handler))
        .route("/api/optimal-start", get(optimal_start_handler))
        .route("/api/max-months", get(max_months_handler))
        .route("/api/solve-target", post(solve_target_handler))
        .fallback(not_found_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_http_server(args: ServeArgs) -> Result<(), CliError> {
    validate_defaults(&args.defaults).map_err(CliError::Usage)?;
    let tables = load_tables(args.tables.as_deref())?;
    let app = router(AppState::new(tables, args.defaults));

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Modalidad 40 API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        return;
    }
    info!("shutting down");
}

pub fn run_calculate(args: CalculateArgs) -> Result<(), CliError> {
    validate_defaults(&args.defaults).map_err(CliError::Usage)?;
    let tables = load_tables(args.tables.as_deref())?;

    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let payload = serde_json::from_str::<CalculatePayload>(&raw)?;
    let request =
        strategy_request_from_payload(payload, &args.defaults, today()).map_err(CliError::Usage)?;
    let response = compute_strategies(&request, &tables)?;

    let out = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{out}");
    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn health_handler() -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

async fn not_found_handler() -> Response {
    ApiError::NotFound.into_response()
}

async fn calculate_handler(
    State(state): State<AppState>,
    payload: Result<Json<CalculatePayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let request = strategy_request_from_payload(payload, &state.defaults, today())
        .map_err(ApiError::BadRequest)?;
    let response = compute_strategies(&request, &state.tables)?;
    Ok(json_response(StatusCode::OK, response))
}

async fn isr_handler(
    State(state): State<AppState>,
    payload: Result<Json<IsrPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    if !payload.pension_mensual.is_finite() || payload.pension_mensual < 0.0 {
        return Err(ApiError::BadRequest(
            "pensionMensual must be a finite amount >= 0".to_string(),
        ));
    }
    let year = payload.year.unwrap_or_else(|| today().year());
    if !CALENDAR_YEARS.contains(&year) {
        return Err(ApiError::BadRequest(format!(
            "year must be between {} and {}",
            CALENDAR_YEARS.start(),
            CALENDAR_YEARS.end()
        )));
    }
    let breakdown: IsrBreakdown = isr(payload.pension_mensual, year, &state.tables);
    Ok(json_response(StatusCode::OK, breakdown))
}

async fn projection_handler(
    State(state): State<AppState>,
    payload: Result<Json<ProjectionPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let config =
        projection_config_from_payload(&payload, today()).map_err(ApiError::BadRequest)?;
    let years = project(payload.pension_inicial, config, &state.tables);
    Ok(json_response(StatusCode::OK, ProjectionResponse { years }))
}

async fn optimal_start_handler(
    query: Result<Query<OptimalStartQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let start: OptimalStart = optimal_start_date(query.birth_date, today());
    Ok(json_response(StatusCode::OK, start))
}

async fn max_months_handler(
    State(state): State<AppState>,
    query: Result<Query<MaxMonthsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let window = months_window_for_query(&query, &state.defaults)?;
    Ok(json_response(StatusCode::OK, window))
}

async fn solve_target_handler(
    State(state): State<AppState>,
    payload: Result<Json<SolveTargetPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let filters = resolve_filters(payload.filters, &state.defaults, today());
    let mut config = TargetSolveConfig::new(payload.target_pension, payload.months, payload.estrategia);
    if let Some(v) = payload.search_min {
        config.search_min = v;
    }
    if let Some(v) = payload.search_max {
        config.search_max = v;
    }
    if let Some(v) = payload.tolerance {
        config.tolerance = v;
    }
    if let Some(v) = payload.max_iterations {
        config.max_iterations = v;
    }

    let result: TargetSolveResult =
        solve_target_pension(&payload.family_data, &filters, config, &state.tables)?;
    Ok(json_response(StatusCode::OK, result))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(
    status: StatusCode,
    error: String,
    kind: ErrorKind,
    code: Option<&'static str>,
) -> Response {
    json_response(status, ErrorResponse { error, kind, code })
}

/// Missing filters come from `defaults`; the start defaults to next month
/// and the duration to a full scan.
fn resolve_filters(
    payload: FiltersPayload,
    defaults: &ScanDefaults,
    today: NaiveDate,
) -> IntegrationFilters {
    let next = YearMonth::of(today).next();
    let months_mode = match (payload.months_mode, payload.months) {
        (None, None) => Some(MonthsMode::Scan),
        (mode, _) => mode,
    };

    IntegrationFilters {
        monthly_contribution_range: payload.monthly_contribution_range.unwrap_or(
            ContributionRange {
                min: defaults.min_contribution,
                max: defaults.max_contribution,
            },
        ),
        months: payload.months,
        months_mode,
        retirement_age: payload.retirement_age.unwrap_or(defaults.retirement_age),
        start_month: payload.start_month.unwrap_or(next.month),
        start_year: payload.start_year.unwrap_or(next.year),
    }
}

#[cfg(test)]
fn strategy_request_from_json(
    json: &str,
    defaults: &ScanDefaults,
    today: NaiveDate,
) -> Result<StrategyRequest, String> {
    let payload = serde_json::from_str::<CalculatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    strategy_request_from_payload(payload, defaults, today)
}

fn strategy_request_from_payload(
    payload: CalculatePayload,
    defaults: &ScanDefaults,
    today: NaiveDate,
) -> Result<StrategyRequest, String> {
    if payload.limit == Some(0) {
        return Err("limit must be > 0".to_string());
    }
    let sort = payload
        .sort_by
        .unwrap_or_else(|| defaults.sort_by.iter().map(|k| (*k).into()).collect());

    Ok(StrategyRequest {
        member: payload.family_data,
        filters: resolve_filters(payload.filters, defaults, today),
        sort,
        limit: payload.limit.or(defaults.limit),
    })
}

/// Infeasible windows and unaffordable ranges are an empty answer, not an error.
fn compute_strategies(
    request: &StrategyRequest,
    tables: &Tables,
) -> Result<StrategiesResponse, EngineError> {
    let sdi_actual = salary_to_sdi(request.member.last_gross_salary, tables);
    let uma_actual = sdi_to_uma_multiple(sdi_actual, request.filters.start_year, tables);

    let (strategies, total_candidates, no_results) =
        match calculate_strategies(&request.member, &request.filters, tables, &request.sort) {
            Ok(ranked) => {
                let total = ranked.len();
                let strategies = match request.limit {
                    Some(n) => top_n(ranked, n),
                    None => ranked,
                };
                let reason = (total == 0).then(|| "no strategies found".to_string());
                (strategies, total, reason)
            }
            Err(err) if err.kind() == ErrorKind::NoResults => {
                info!(reason = %err, "no strategies for request");
                (Vec::new(), 0, Some(err.to_string()))
            }
            Err(err) => return Err(err),
        };

    Ok(StrategiesResponse {
        strategies,
        total_candidates,
        sdi_actual,
        uma_actual,
        no_results,
    })
}

fn projection_config_from_payload(
    payload: &ProjectionPayload,
    today: NaiveDate,
) -> Result<ProjectionConfig, String> {
    if !payload.pension_inicial.is_finite() || payload.pension_inicial < 0.0 {
        return Err("pensionInicial must be a finite amount >= 0".to_string());
    }

    let start_year = payload.anio_inicio.unwrap_or(today.year());
    if !CALENDAR_YEARS.contains(&start_year) {
        return Err(format!(
            "anioInicio must be between {} and {}",
            CALENDAR_YEARS.start(),
            CALENDAR_YEARS.end()
        ));
    }
    let mut config = ProjectionConfig::starting(start_year);
    if let Some(v) = payload.years {
        if v > MAX_PROJECTION_YEARS {
            return Err(format!("years must be <= {MAX_PROJECTION_YEARS}"));
        }
        config.years = v;
    }
    if let Some(v) = payload.incremento_anual {
        if !v.is_finite() || v <= -1.0 {
            return Err("incrementoAnual must be > -1".to_string());
        }
        config.annual_increase = v;
    }
    Ok(config)
}

fn months_window_for_query(
    query: &MaxMonthsQuery,
    defaults: &ScanDefaults,
) -> Result<MonthsWindow, ValidationError> {
    let retirement_age = query.retirement_age.unwrap_or(defaults.retirement_age);
    if !(MIN_RETIREMENT_AGE..=MAX_RETIREMENT_AGE).contains(&retirement_age) {
        return Err(ValidationError::RetirementAgeOutOfRange(retirement_age));
    }
    let start = YearMonth::new(query.start_year, query.start_month);
    if !start.is_valid() {
        return Err(ValidationError::InvalidStartMonth(query.start_month));
    }
    Ok(max_months_m40(query.birth_date, retirement_age, start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CivilStatus, MAX_M40_MONTHS};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn today_fixture() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 20).expect("valid date")
    }

    fn sample_state() -> AppState {
        AppState::new(Tables::official(), ScanDefaults::default())
    }

    const SCENARIO_JSON: &str = r#"{
        "familyData": {
            "id": "fm-1",
            "birthDate": "1969-01-01",
            "weeksContributed": 500,
            "lastGrossSalary": 25000,
            "civilStatus": "soltero"
        },
        "filters": {
            "monthlyContributionRange": { "min": 1000, "max": 15000 },
            "monthsMode": "scan",
            "retirementAge": 65,
            "startMonth": 2,
            "startYear": 2025
        }
    }"#;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[test]
    fn validate_defaults_rejects_out_of_range_retirement_age() {
        let defaults = ScanDefaults {
            retirement_age: 59,
            ..ScanDefaults::default()
        };
        let err = validate_defaults(&defaults).expect_err("must reject");
        assert!(err.contains("--retirement-age"));
    }

    #[test]
    fn validate_defaults_rejects_inverted_contribution_bounds() {
        let defaults = ScanDefaults {
            min_contribution: 5_000.0,
            max_contribution: 1_000.0,
            ..ScanDefaults::default()
        };
        let err = validate_defaults(&defaults).expect_err("must reject");
        assert!(err.contains("--max-contribution"));
    }

    #[test]
    fn strategy_request_from_json_parses_web_keys() {
        let request =
            strategy_request_from_json(SCENARIO_JSON, &ScanDefaults::default(), today_fixture())
                .expect("valid request");
        assert_eq!(request.member.id.as_deref(), Some("fm-1"));
        assert_eq!(request.member.civil_status, CivilStatus::Soltero);
        assert_eq!(request.filters.months_mode, Some(MonthsMode::Scan));
        assert_eq!(request.filters.start(), YearMonth::new(2025, 2));
        assert_approx(request.filters.monthly_contribution_range.max, 15_000.0);
        assert!(request.sort.is_empty());
    }

    #[test]
    fn missing_filters_fall_back_to_defaults() {
        let json = r#"{
            "familyData": {
                "birthDate": "1970-05-10",
                "weeksContributed": 900,
                "lastGrossSalary": 18000,
                "civilStatus": "married"
            },
            "sortBy": ["roi"]
        }"#;
        let defaults = ScanDefaults {
            retirement_age: 62,
            limit: Some(10),
            ..ScanDefaults::default()
        };
        let request =
            strategy_request_from_json(json, &defaults, today_fixture()).expect("valid request");
        assert_eq!(request.member.civil_status, CivilStatus::Casado);
        assert_eq!(request.filters.retirement_age, 62);
        assert_eq!(request.filters.start(), YearMonth::new(2025, 2));
        assert_eq!(request.filters.months_mode, Some(MonthsMode::Scan));
        assert_eq!(request.sort, vec![SortKey::RoiDesc]);
        assert_eq!(request.limit, Some(10));
    }

    #[test]
    fn explicit_months_are_not_turned_into_a_scan() {
        let json = r#"{
            "familyData": {
                "birthDate": "1970-05-10",
                "weeksContributed": 900,
                "lastGrossSalary": 18000,
                "civilStatus": "soltero"
            },
            "filters": { "months": 24 }
        }"#;
        let request = strategy_request_from_json(json, &ScanDefaults::default(), today_fixture())
            .expect("valid request");
        assert_eq!(request.filters.months, Some(24));
        assert_eq!(request.filters.months_mode, None);
    }

    #[test]
    fn compute_strategies_truncates_but_counts_everything() {
        let mut request =
            strategy_request_from_json(SCENARIO_JSON, &ScanDefaults::default(), today_fixture())
                .expect("valid request");
        request.limit = Some(5);
        let response = compute_strategies(&request, &Tables::official()).expect("scenario runs");
        assert_eq!(response.strategies.len(), 5);
        assert_eq!(response.total_candidates, 23 * MAX_M40_MONTHS as usize * 2);
        assert!(response.no_results.is_none());
        assert_approx(response.sdi_actual, 25_000.0 / 30.4 * 1.12);
    }

    #[test]
    fn infeasible_window_is_an_empty_answer() {
        let mut request =
            strategy_request_from_json(SCENARIO_JSON, &ScanDefaults::default(), today_fixture())
                .expect("valid request");
        request.filters.retirement_age = 60;
        request.filters.start_year = 2029;

        let response = compute_strategies(&request, &Tables::official()).expect("empty answer");
        assert!(response.strategies.is_empty());
        assert_eq!(response.total_candidates, 0);
        assert!(response.no_results.is_some());
    }

    #[test]
    fn projection_payload_validation() {
        let payload = ProjectionPayload {
            pension_inicial: 12_000.0,
            years: None,
            incremento_anual: None,
            anio_inicio: None,
        };
        let config = projection_config_from_payload(&payload, today_fixture()).expect("valid");
        assert_eq!(config.years, 20);
        assert_eq!(config.start_year, 2025);

        let too_long = ProjectionPayload {
            years: Some(500),
            ..payload
        };
        let err = projection_config_from_payload(&too_long, today_fixture()).expect_err("reject");
        assert!(err.contains("years"));

        for year in [i32::MAX, i32::MIN, 1899, 2201] {
            let far = ProjectionPayload {
                anio_inicio: Some(year),
                ..payload
            };
            let err = projection_config_from_payload(&far, today_fixture()).expect_err("reject");
            assert!(err.contains("anioInicio"));
        }
        let last = ProjectionPayload {
            anio_inicio: Some(2200),
            ..payload
        };
        assert!(projection_config_from_payload(&last, today_fixture()).is_ok());
    }

    #[tokio::test]
    async fn projection_endpoint_rejects_unbounded_start_year() {
        let payload = ProjectionPayload {
            pension_inicial: 12_000.0,
            years: Some(20),
            incremento_anual: None,
            anio_inicio: Some(i32::MAX),
        };
        let err = projection_handler(State(sample_state()), Ok(Json(payload)))
            .await
            .expect_err("must reject");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["kind"], "invalid_input");
    }

    #[test]
    fn max_months_query_checks_retirement_age() {
        let query = MaxMonthsQuery {
            birth_date: NaiveDate::from_ymd_opt(1969, 1, 1).expect("valid date"),
            retirement_age: Some(66),
            start_month: 2,
            start_year: 2025,
        };
        let err =
            months_window_for_query(&query, &ScanDefaults::default()).expect_err("must reject");
        assert_eq!(err, ValidationError::RetirementAgeOutOfRange(66));

        let ok = MaxMonthsQuery {
            retirement_age: None,
            ..query
        };
        let window = months_window_for_query(&ok, &ScanDefaults::default()).expect("valid");
        assert_eq!(window.max_months, MAX_M40_MONTHS);
        assert!(window.limited);
    }

    #[tokio::test]
    async fn calculate_endpoint_returns_ranked_strategies() {
        let payload = serde_json::from_str::<CalculatePayload>(SCENARIO_JSON).expect("payload");
        let response = calculate_handler(State(sample_state()), Ok(Json(payload)))
            .await
            .expect("handler succeeds");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&header::HeaderValue::from_static("no-store"))
        );

        let body = body_json(response).await;
        let strategies = body["strategies"].as_array().expect("strategies array");
        assert!(!strategies.is_empty());
        assert_eq!(strategies[0]["ranking"], 1);
        assert!(strategies[0]["ROI"].is_number());
        assert!(strategies[0]["pensionMensual"].as_f64().expect("pension") >= 278.80 * 30.4);
    }

    #[tokio::test]
    async fn calculate_endpoint_maps_validation_errors_to_bad_request() {
        let json = SCENARIO_JSON.replace("\"weeksContributed\": 500", "\"weeksContributed\": 499");
        let payload = serde_json::from_str::<CalculatePayload>(&json).expect("payload");
        let err = calculate_handler(State(sample_state()), Ok(Json(payload)))
            .await
            .expect_err("must reject");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["kind"], "invalid_input");
        assert_eq!(body["code"], "InsufficientWeeks");
        assert!(body["error"].as_str().expect("message").contains("499"));
    }

    #[tokio::test]
    async fn isr_endpoint_rejects_negative_pension() {
        let payload = IsrPayload {
            pension_mensual: -1.0,
            year: Some(2025),
        };
        let err = isr_handler(State(sample_state()), Ok(Json(payload)))
            .await
            .expect_err("must reject");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn isr_endpoint_returns_breakdown() {
        let payload = IsrPayload {
            pension_mensual: 60_000.0,
            year: Some(2025),
        };
        let response = isr_handler(State(sample_state()), Ok(Json(payload)))
            .await
            .expect("handler succeeds");
        let body = body_json(response).await;
        let gross = body["pensionBruta"].as_f64().expect("gross");
        let net = body["pensionNeta"].as_f64().expect("net");
        let tax = body["isrMensual"].as_f64().expect("tax");
        assert_approx(net + tax, gross);
        assert!(tax > 0.0);
    }

    #[tokio::test]
    async fn solve_target_endpoint_reports_window_overflow() {
        let payload = SolveTargetPayload {
            family_data: serde_json::from_str::<CalculatePayload>(SCENARIO_JSON)
                .expect("payload")
                .family_data,
            filters: FiltersPayload {
                retirement_age: Some(60),
                start_month: Some(1),
                start_year: Some(2026),
                ..FiltersPayload::default()
            },
            months: 48,
            estrategia: StrategyKind::Fijo,
            target_pension: 10_000.0,
            search_min: None,
            search_max: None,
            tolerance: None,
            max_iterations: None,
        };
        let err = solve_target_handler(State(sample_state()), Ok(Json(payload)))
            .await
            .expect_err("window is 36 months");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["kind"], "no_results");
    }

    #[tokio::test]
    async fn solve_target_endpoint_rejects_runaway_iteration_budget() {
        let payload = SolveTargetPayload {
            family_data: serde_json::from_str::<CalculatePayload>(SCENARIO_JSON)
                .expect("payload")
                .family_data,
            filters: FiltersPayload::default(),
            months: 40,
            estrategia: StrategyKind::Fijo,
            target_pension: 12_000.0,
            search_min: None,
            search_max: None,
            tolerance: None,
            max_iterations: Some(u32::MAX),
        };
        let err = solve_target_handler(State(sample_state()), Ok(Json(payload)))
            .await
            .expect_err("must reject");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "invalid_input");
        assert_eq!(body["code"], "InvalidSearch");
    }

    #[tokio::test]
    async fn calculate_endpoint_rejects_zero_limit() {
        let json = SCENARIO_JSON.replacen('{', "{\"limit\": 0,", 1);
        let payload = serde_json::from_str::<CalculatePayload>(&json).expect("payload");
        let err = calculate_handler(State(sample_state()), Ok(Json(payload)))
            .await
            .expect_err("must reject");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "invalid_input");
        assert!(body["error"].as_str().expect("message").contains("limit"));

        let err = strategy_request_from_json(&json, &ScanDefaults::default(), today_fixture())
            .expect_err("must reject");
        assert!(err.contains("limit"));
    }

    #[tokio::test]
    async fn isr_endpoint_rejects_out_of_range_year() {
        let payload = IsrPayload {
            pension_mensual: 60_000.0,
            year: Some(i32::MAX),
        };
        let err = isr_handler(State(sample_state()), Ok(Json(payload)))
            .await
            .expect_err("must reject");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_routes_are_json_404() {
        let response = not_found_handler().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Not found");
    }
}
