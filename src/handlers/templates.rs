use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::AdminToken;
use crate::loader::ReloadError;
use crate::models::{DeviceTemplate, TemplateEntry};
use crate::validator::{self, ValidationWarning};
use crate::AppState;

use super::ApiError;

/// List all templates, ordered by identifier
pub async fn list_templates(State(state): State<Arc<AppState>>) -> Json<Vec<TemplateEntry>> {
    Json(state.registry.list().to_entries())
}

/// Get a single template by identifier
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TemplateEntry>, ApiError> {
    let template = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::not_found("template"))?;
    Ok(Json(TemplateEntry {
        id,
        template: DeviceTemplate::clone(&template),
    }))
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub template: DeviceTemplate,
    pub warnings: Vec<ValidationWarning>,
}

/// Validate a raw template without registering it
pub async fn validate_template(
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let raw = match body {
        serde_json::Value::Object(map) => map,
        _ => return Err(ApiError::bad_request("template must be a JSON object")),
    };

    match validator::validate_report(&raw) {
        Ok(validated) => Ok(Json(ValidateResponse {
            template: validated.template,
            warnings: validated.warnings,
        })),
        Err(errors) => Err(ApiError::unprocessable(
            format!("template has {} invalid field(s)", errors.len()),
            &errors,
        )),
    }
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub message: String,
    pub loaded: usize,
    pub generation: u64,
}

/// Reload every template from the template directory as one batch
pub async fn reload_templates(
    _admin: AdminToken,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReloadResponse>, ApiError> {
    match state.trigger_reload().await {
        Ok(summary) => Ok(Json(ReloadResponse {
            message: "templates reloaded".to_string(),
            loaded: summary.loaded,
            generation: summary.generation,
        })),
        Err(ReloadError::Rejected(aborted)) => {
            Err(ApiError::unprocessable(aborted.to_string(), &aborted.failures))
        }
        Err(ReloadError::Fetch(e)) => {
            Err(ApiError::internal(format!("Failed to read templates: {:#}", e)))
        }
    }
}
