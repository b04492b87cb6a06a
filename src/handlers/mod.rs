pub mod templates;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::registry::RegistryState;
use crate::AppState;

/// Error response - {"error": "message"} plus optional structured details
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}

/// API error type
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<serde_json::Value>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{} not found", resource))
    }

    /// Input was understood but failed validation; `details` carries the report
    pub fn unprocessable<T: Serialize>(msg: impl Into<String>, details: &T) -> Self {
        Self {
            details: serde_json::to_value(details).ok(),
            ..Self::new(StatusCode::UNPROCESSABLE_ENTITY, msg)
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                details: self.details,
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub registry: RegistryState,
    pub templates: usize,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ws_clients: usize,
    pub timestamp: String,
}

/// Healthcheck endpoint - returns 200 OK with registry status
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.registry.snapshot();
    let ws_clients = match &state.ws_hub {
        Some(hub) => hub.client_count().await,
        None => 0,
    };
    Json(HealthResponse {
        status: "ok",
        service: "device-templates",
        registry: state.registry.state(),
        templates: snapshot.len(),
        generation: snapshot.generation(),
        loaded_at: snapshot.loaded_at(),
        ws_clients,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
