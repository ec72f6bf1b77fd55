//! HTTP API for the Salon Planner.
//!
//! This module exposes the derivation engine, the scenario store and the
//! owner profile over a small REST API built on
//! [`axum`](https://crates.io/crates/axum).  Owner-scoped routes are
//! checked against the configured [`AccessPolicy`] before any store is
//! touched; `/api/compute` is open, since computation needs no stored
//! state.

use crate::access::{AccessPolicy, AllowAll, AllowList};
use crate::config::Config;
use crate::engine::compute;
use crate::error::PlannerError;
use crate::models::{InputSnapshot, Metrics, VariableCostPercentages};
use crate::profile::{load_snapshot, save_snapshot, MemoryProfileStore, ProfileStore};
use crate::scenario::{
    compare, compare_live, ComparisonMetric, ComparisonRow, FileScenarioStore,
    MemoryScenarioStore, Scenario, ScenarioStore, ScenarioSummary,
};
use crate::summary::{key_insights, period_summaries, profit_model, PeriodSummary, ProfitModel};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared across requests.
pub struct AppState {
    pub scenarios: Arc<dyn ScenarioStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub policy: Arc<dyn AccessPolicy>,
}

impl AppState {
    /// State with in-memory stores and no owner restrictions.
    pub fn in_memory() -> Self {
        Self {
            scenarios: Arc::new(MemoryScenarioStore::new()),
            profiles: Arc::new(MemoryProfileStore::new()),
            policy: Arc::new(AllowAll),
        }
    }

    /// Builds state from configuration.  If the scenario directory cannot
    /// be opened the server falls back to in-memory scenarios rather than
    /// refusing to start.
    pub fn from_config(config: &Config) -> Self {
        let scenarios: Arc<dyn ScenarioStore> = match &config.scenario_dir {
            Some(dir) => match FileScenarioStore::open(dir) {
                Ok(store) => Arc::new(store),
                Err(err) => {
                    warn!(error = %err, "falling back to in-memory scenario store");
                    Arc::new(MemoryScenarioStore::new())
                }
            },
            None => Arc::new(MemoryScenarioStore::new()),
        };
        let policy: Arc<dyn AccessPolicy> = match &config.allowed_owners {
            Some(owners) => Arc::new(AllowList::new(owners.iter().cloned())),
            None => Arc::new(AllowAll),
        };
        Self {
            scenarios,
            profiles: Arc::new(MemoryProfileStore::new()),
            policy,
        }
    }
}

/// Error wrapper turning [`PlannerError`] into a JSON response.
#[derive(Debug)]
pub struct ApiError(PlannerError);

impl From<PlannerError> for ApiError {
    fn from(err: PlannerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PlannerError::Validation(_) | PlannerError::Serialization(_) => StatusCode::BAD_REQUEST,
            PlannerError::Unauthorized(_) => StatusCode::FORBIDDEN,
            PlannerError::NotFound { .. } => StatusCode::NOT_FOUND,
            PlannerError::CapacityExceeded { .. } | PlannerError::ScenarioActive(_) => {
                StatusCode::CONFLICT
            }
            PlannerError::StoreUnavailable(_) => {
                warn!(error = %self.0, "store unavailable");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        let body = Json(serde_json::json!({"error": self.0.to_string()}));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ComputeResponse {
    pub metrics: Metrics,
    pub variable_cost_percentages: VariableCostPercentages,
    pub summaries: Vec<PeriodSummary>,
    pub profit_model: ProfitModel,
    pub insights: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveScenarioRequest {
    #[serde(default)]
    pub description: String,
    pub input: Value,
}

/// An unsaved plan to compare alongside saved scenarios.
#[derive(Debug, Deserialize)]
pub struct LivePlan {
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub names: Vec<String>,
    pub metric: ComparisonMetric,
    /// Working plans appended after the saved scenarios.
    #[serde(default)]
    pub live: Vec<LivePlan>,
}

/// Build the API router over the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/defaults", get(defaults_handler))
        .route("/api/compute", post(compute_handler))
        .route("/api/owners/:owner/scenarios", get(list_scenarios_handler))
        .route(
            "/api/owners/:owner/scenarios/:name",
            get(load_scenario_handler)
                .put(save_scenario_handler)
                .delete(delete_scenario_handler),
        )
        .route("/api/owners/:owner/compare", post(compare_handler))
        .route(
            "/api/owners/:owner/profile",
            get(load_profile_handler).put(save_profile_handler),
        )
        .with_state(state)
}

async fn defaults_handler() -> Json<InputSnapshot> {
    Json(InputSnapshot::default())
}

/// Handler for POST /api/compute
async fn compute_handler(Json(body): Json<Value>) -> ApiResult<Json<ComputeResponse>> {
    let input = InputSnapshot::from_value(body)?;
    let computation = compute(&input)?;
    let summaries = period_summaries(&computation.metrics);
    let profit_model = profit_model(&computation.metrics);
    let insights = key_insights(&computation.metrics, &profit_model);
    Ok(Json(ComputeResponse {
        metrics: computation.metrics,
        variable_cost_percentages: computation.variable_cost_percentages,
        summaries,
        profit_model,
        insights,
    }))
}

async fn list_scenarios_handler(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> ApiResult<Json<Vec<ScenarioSummary>>> {
    state.policy.authorize(&owner)?;
    Ok(Json(state.scenarios.list(&owner)?))
}

async fn load_scenario_handler(
    State(state): State<Arc<AppState>>,
    Path((owner, name)): Path<(String, String)>,
) -> ApiResult<Json<Scenario>> {
    state.policy.authorize(&owner)?;
    Ok(Json(state.scenarios.load(&owner, &name)?))
}

/// Handler for PUT /api/owners/:owner/scenarios/:name.  Metrics are
/// computed server-side so the cached copy always matches the input.
async fn save_scenario_handler(
    State(state): State<Arc<AppState>>,
    Path((owner, name)): Path<(String, String)>,
    Json(request): Json<SaveScenarioRequest>,
) -> ApiResult<Json<Scenario>> {
    state.policy.authorize(&owner)?;
    let mut input = InputSnapshot::from_value(request.input)?;
    let computation = compute(&input)?;
    input.variable_cost_percentages = computation.variable_cost_percentages;
    let scenario = state.scenarios.save(
        &owner,
        &name,
        &request.description,
        &input,
        &computation.metrics,
    )?;
    Ok(Json(scenario))
}

async fn delete_scenario_handler(
    State(state): State<Arc<AppState>>,
    Path((owner, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.policy.authorize(&owner)?;
    state.scenarios.delete(&owner, &name)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn compare_handler(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
    Json(request): Json<CompareRequest>,
) -> ApiResult<Json<Vec<ComparisonRow>>> {
    state.policy.authorize(&owner)?;
    let mut rows = compare(
        state.scenarios.as_ref(),
        &owner,
        &request.names,
        request.metric,
    )?;
    let mut live_names = Vec::with_capacity(request.live.len());
    let mut live_inputs = Vec::with_capacity(request.live.len());
    for plan in request.live {
        live_inputs.push(InputSnapshot::from_value(plan.input)?);
        live_names.push(plan.name);
    }
    rows.extend(compare_live(&live_names, &live_inputs, request.metric)?);
    Ok(Json(rows))
}

async fn load_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> ApiResult<Json<InputSnapshot>> {
    state.policy.authorize(&owner)?;
    Ok(Json(load_snapshot(state.profiles.as_ref(), &owner)?))
}

async fn save_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<InputSnapshot>> {
    state.policy.authorize(&owner)?;
    let input = InputSnapshot::from_value(body)?;
    save_snapshot(state.profiles.as_ref(), &owner, &input)?;
    Ok(Json(input))
}

/// Launch the API server.  Builds state from `config`, binds to its
/// address and blocks until the server terminates.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(&config));
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Stylist;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::json;
    use tower::ServiceExt;

    fn sample_input() -> InputSnapshot {
        let mut input = InputSnapshot::default();
        input.stylists = vec![Stylist::new("Amy", 1000.0, 0.0)];
        input.retail_percentage = 20.0;
        input.salary_settings.service_commission_pct = 40.0;
        input.salary_settings.retail_commission_pct = 10.0;
        input.trainees.clear();
        input.receptionists.clear();
        input
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn router() -> Router {
        build_router(Arc::new(AppState::in_memory()))
    }

    #[tokio::test]
    async fn compute_returns_metrics_and_summaries() {
        let router = router();
        let body = serde_json::to_value(sample_input()).unwrap();
        let (status, value) = send(&router, Method::POST, "/api/compute", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["metrics"]["monthly_salary_cost"], json!(1820.0));
        assert_eq!(value["metrics"]["monthly_total_sales"], json!(5200.0));
        assert_eq!(value["summaries"].as_array().unwrap().len(), 3);
        assert_eq!(value["profit_model"]["points"].as_array().unwrap().len(), 100);
        assert_eq!(value["insights"][0], json!("Current monthly sales: £5,200.00"));
    }

    #[tokio::test]
    async fn compute_rejects_negative_input() {
        let router = router();
        let mut input = sample_input();
        input.retail_percentage = -1.0;
        let body = serde_json::to_value(input).unwrap();
        let (status, value) = send(&router, Method::POST, "/api/compute", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(value["error"].as_str().unwrap().contains("retail_percentage"));
    }

    #[tokio::test]
    async fn scenario_routes() {
        let router = router();
        let input = serde_json::to_value(sample_input()).unwrap();
        for name in ["a", "b", "c"] {
            let (status, _) = send(
                &router,
                Method::PUT,
                &format!("/api/owners/o/scenarios/{name}"),
                Some(json!({"description": name, "input": input})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = send(
            &router,
            Method::PUT,
            "/api/owners/o/scenarios/d",
            Some(json!({"input": input})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, list) = send(&router, Method::GET, "/api/owners/o/scenarios", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 3);

        let (status, scenario) =
            send(&router, Method::GET, "/api/owners/o/scenarios/b", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(scenario["description"], json!("b"));
        assert_eq!(scenario["metrics"]["monthly_total_sales"], json!(5200.0));

        let (status, rows) = send(
            &router,
            Method::POST,
            "/api/owners/o/compare",
            Some(json!({"names": ["c", "a"], "metric": "monthly_profit"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows[0]["name"], json!("c"));

        let (status, _) = send(&router, Method::DELETE, "/api/owners/o/scenarios/b", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&router, Method::GET, "/api/owners/o/scenarios/b", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_round_trip() {
        let router = router();
        let (status, defaults) = send(&router, Method::GET, "/api/owners/o/profile", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(defaults, serde_json::to_value(InputSnapshot::default()).unwrap());

        let input = serde_json::to_value(sample_input()).unwrap();
        let (status, _) =
            send(&router, Method::PUT, "/api/owners/o/profile", Some(input.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (_, loaded) = send(&router, Method::GET, "/api/owners/o/profile", None).await;
        assert_eq!(loaded, input);
    }

    #[tokio::test]
    async fn policy_blocks_unknown_owners() {
        let state = AppState {
            policy: Arc::new(AllowList::new(["alice"])),
            ..AppState::in_memory()
        };
        let router = build_router(Arc::new(state));
        let (status, _) =
            send(&router, Method::GET, "/api/owners/mallory/scenarios", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&router, Method::GET, "/api/owners/alice/scenarios", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn compare_includes_live_plans() {
        let router = router();
        let input = serde_json::to_value(sample_input()).unwrap();
        send(
            &router,
            Method::PUT,
            "/api/owners/o/scenarios/saved",
            Some(json!({"input": input})),
        )
        .await;
        let mut bigger = sample_input();
        bigger.stylists[0].weekly_sales = 2000.0;
        let (status, rows) = send(
            &router,
            Method::POST,
            "/api/owners/o/compare",
            Some(json!({
                "names": ["saved"],
                "metric": "monthly_revenue",
                "live": [{"name": "Current Plan", "input": bigger}],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rows[0]["value"], json!(5200.0));
        assert_eq!(rows[1]["name"], json!("Current Plan"));
        assert_eq!(rows[1]["value"], json!(10400.0));
    }

    #[tokio::test]
    async fn padded_scenario_names_resolve() {
        let router = router();
        let input = serde_json::to_value(sample_input()).unwrap();
        let (status, saved) = send(
            &router,
            Method::PUT,
            "/api/owners/o/scenarios/%20a",
            Some(json!({"input": input})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["name"], json!("a"));
        let (status, _) = send(&router, Method::GET, "/api/owners/o/scenarios/%20a", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn broken_scenario_directory_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("scenarios");
        let store = FileScenarioStore::open(&root).unwrap();
        std::fs::remove_dir(&root).unwrap();
        std::fs::write(&root, "x").unwrap();
        let state = AppState {
            scenarios: Arc::new(store),
            ..AppState::in_memory()
        };
        let router = build_router(Arc::new(state));
        let (status, value) = send(&router, Method::GET, "/api/owners/o/scenarios", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(value["error"].as_str().unwrap().contains("cannot read"));

        // Computation does not depend on the store.
        let body = serde_json::to_value(sample_input()).unwrap();
        let (status, _) = send(&router, Method::POST, "/api/compute", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn unopenable_scenario_dir_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, "x").unwrap();
        let config = Config {
            bind_addr: crate::config::DEFAULT_BIND_ADDR.parse().unwrap(),
            scenario_dir: Some(file),
            allowed_owners: None,
        };
        assert_eq!(AppState::from_config(&config).scenarios.name(), "memory");

        let config = Config {
            scenario_dir: Some(dir.path().join("ok")),
            ..config
        };
        assert_eq!(AppState::from_config(&config).scenarios.name(), "file");
    }
}
