// Cost Manager - Web Server
// REST API with Axum over the session-scoped cost store

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clap::Parser;
use cost_manager::{
    Category, CostEntry, CostEntryInput, CostError, CostManager, StorageConfig, StorageErrorReason,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    manager: Arc<CostManager>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldErrorResponse>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            fields: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct FieldErrorResponse {
    field: String,
    message: String,
}

impl From<&ValidationError> for FieldErrorResponse {
    fn from(e: &ValidationError) -> Self {
        Self {
            field: e.field.clone(),
            message: e.message.clone(),
        }
    }
}

#[derive(Serialize)]
struct CategoryResponse {
    value: &'static str,
    label: &'static str,
}

#[derive(Deserialize)]
struct PeriodQuery {
    month: Option<u32>,
    year: Option<i32>,
}

// ============================================================================
// Error mapping
// ============================================================================

enum ApiError {
    Cost(CostError),
    BadRequest(String),
    NotFound(String),
    Worker(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Cost(CostError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Cost(CostError::Storage(e)) if e.reason == StorageErrorReason::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Cost(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, fields) = match &self {
            ApiError::Cost(CostError::Validation(errors)) => (
                "Please fill all the fields".to_string(),
                errors.iter().map(FieldErrorResponse::from).collect(),
            ),
            ApiError::Cost(e) => (e.to_string(), Vec::new()),
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Worker(msg) => (msg.clone(), Vec::new()),
        };

        if status.is_server_error() {
            error!(%status, "request failed: {}", message);
        } else {
            warn!(%status, "request rejected: {}", message);
        }

        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            fields,
        };
        (status, Json(body)).into_response()
    }
}

/// Run a storage call off the async runtime; each call is its own session.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&CostManager) -> Result<T, CostError> + Send + 'static,
{
    let manager = Arc::clone(&state.manager);
    tokio::task::spawn_blocking(move || f(&manager))
        .await
        .map_err(|e| ApiError::Worker(format!("storage task failed: {}", e)))?
        .map_err(ApiError::Cost)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/costs[?month=&year=] - All costs, or one month's costs
async fn list_costs(
    State(state): State<AppState>,
    Query(period): Query<PeriodQuery>,
) -> Result<Json<ApiResponse<Vec<CostEntry>>>, ApiError> {
    let costs = match (period.month, period.year) {
        (Some(month), Some(year)) => {
            blocking(&state, move |m| m.list_costs_by_period(month, year)).await?
        }
        (None, None) => blocking(&state, |m| m.list_costs()).await?,
        _ => {
            return Err(ApiError::BadRequest(
                "month and year must be given together".to_string(),
            ))
        }
    };

    Ok(Json(ApiResponse::ok(costs)))
}

/// GET /api/costs/:id - One cost by id
async fn get_cost(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CostEntry>>, ApiError> {
    blocking(&state, move |m| m.get_cost(id))
        .await?
        .map(|cost| Json(ApiResponse::ok(cost)))
        .ok_or_else(|| ApiError::NotFound(format!("no cost with id {}", id)))
}

/// POST /api/costs - Record a new cost
async fn create_cost(
    State(state): State<AppState>,
    Json(input): Json<CostEntryInput>,
) -> Result<(StatusCode, Json<ApiResponse<CostEntry>>), ApiError> {
    let cost = blocking(&state, move |m| m.append_cost(&input)).await?;
    info!(id = cost.id, "cost added");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(cost))))
}

/// GET /api/categories - Categories offered by the entry form
async fn list_categories() -> impl IntoResponse {
    let categories: Vec<CategoryResponse> = Category::ALL
        .iter()
        .map(|c| CategoryResponse {
            value: c.as_str(),
            label: c.label(),
        })
        .collect();

    Json(ApiResponse::ok(categories))
}

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/costs", get(list_costs).post(create_cost))
        .route("/costs/:id", get(get_cost))
        .route("/categories", get(list_categories))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[derive(Parser)]
#[command(name = "cost-server")]
#[command(about = "REST API for the cost manager")]
struct Args {
    /// Database file (defaults to ./cost-manager.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Use a throwaway in-memory database
    #[arg(long)]
    memory: bool,

    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    println!("🌐 Cost Manager - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut config = StorageConfig::default();
    if let Some(path) = args.db {
        config = config.at_path(path);
    }
    if args.memory {
        config = config.in_memory();
    }

    let manager = CostManager::open(&config)?;
    println!("✓ Database opened: {:?}", manager.database());

    let state = AppState {
        manager: Arc::new(manager),
    };

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;

    println!("\n🚀 Server running on http://{}", args.addr);
    println!("   API: http://{}/api/costs", args.addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let manager = CostManager::open(&StorageConfig::default().in_memory()).unwrap();
        app(AppState {
            manager: Arc::new(manager),
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_cost(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/costs")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_filter() {
        let app = test_app();

        let (status, body) = send(
            &app,
            post_cost(serde_json::json!({
                "costName": "Rent", "amount": 1200, "month": 1, "year": 1990, "category": "Living"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["costName"], "Rent");

        let (status, _) = send(
            &app,
            post_cost(serde_json::json!({
                "costName": "Gas", "amount": 40, "month": 2, "year": 1990, "category": "Car"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, get("/api/costs?month=1&year=1990")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (_, body) = send(&app, get("/api/costs")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_fields_are_unprocessable() {
        let app = test_app();

        let (status, body) = send(&app, post_cost(serde_json::json!({ "costName": "Rent" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["fields"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_half_period_is_bad_request() {
        let app = test_app();
        let (status, _) = send(&app, get("/api/costs?month=1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let app = test_app();
        let (status, body) = send(&app, get("/api/costs/42")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_storage_failures_are_service_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::default()
            .at_path(dir.path().join("costs.db"))
            .with_busy_timeout(std::time::Duration::from_millis(100));
        let app = app(AppState {
            manager: Arc::new(CostManager::open(&config).unwrap()),
        });

        // Another connection holds the file exclusively
        let holder = rusqlite::Connection::open(dir.path().join("costs.db")).unwrap();
        holder
            .execute_batch("PRAGMA locking_mode = EXCLUSIVE; BEGIN EXCLUSIVE; DELETE FROM costs;")
            .unwrap();

        let (status, body) = send(&app, get("/api/costs")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("connection_lost"));

        holder.execute_batch("COMMIT").unwrap();
        drop(holder);

        // Another handle moved the schema past this server's version
        cost_manager::Database::open(&config.clone().with_version(3)).unwrap();

        let (status, body) = send(
            &app,
            post_cost(serde_json::json!({
                "costName": "Rent", "amount": 1200, "month": 1, "year": 1990, "category": "Living"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("version_conflict"));
    }

    #[tokio::test]
    async fn test_categories() {
        let app = test_app();
        let (status, body) = send(&app, get("/api/categories")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][1]["label"], "Car Expenses");
    }
}
