use crate::config::toml_config::ServerConfig;
use crate::core::EnrollmentWorkflow;
use crate::domain::model::{EnrollmentOutcome, EnrollmentRequest};
use crate::utils::error::{EnrollError, FieldError, Result, WorkflowError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<EnrollmentWorkflow>,
}

impl AppState {
    pub fn new(workflow: EnrollmentWorkflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
        }
    }
}

pub fn app(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/subscribe", post(subscribe))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 空清單或 "*" 允許所有來源，否則只允許列出的來源
pub fn cors_layer(config: &ServerConfig) -> Result<CorsLayer> {
    let origins = &config.allowed_origins;
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let values = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|e| EnrollError::InvalidConfigValueError {
                    field: "server.allowed_origins".to_string(),
                    value: origin.clone(),
                    reason: format!("Invalid origin: {}", e),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]))
}

async fn root() -> &'static str {
    "✅ Subscription enrollment backend is live!"
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /subscribe
async fn subscribe(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EnrollmentRequest>, JsonRejection>,
) -> (StatusCode, Json<EnrollmentOutcome>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!("⚠️ Unreadable enrollment body: {}", rejection.body_text());
            let err = WorkflowError::Validation(vec![FieldError::new("body", rejection.body_text())]);
            return (StatusCode::BAD_REQUEST, Json(EnrollmentOutcome::failed(&err, None, None)));
        }
    };

    let outcome = state.workflow.enroll(request).await;
    let status =
        StatusCode::from_u16(outcome.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(outcome))
}
