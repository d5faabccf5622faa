//! services/app/src/web/rest.rs
//!
//! Contains the Axum handlers for generating summaries and browsing the saved
//! collection, and the master definition for the OpenAPI specification.

use crate::web::auth::{AuthResponse, LoginRequest, ProfileUpdateRequest, RegisterRequest};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use mintar_core::{
    domain::{DocumentUpload, RecordSummary, SavedRecord, StudySummary},
    ports::PortError,
    StoreError,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_summary_handler,
        list_saved_handler,
        save_record_handler,
        get_saved_handler,
        delete_saved_handler,
        crate::web::auth::login_handler,
        crate::web::auth::register_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::me_handler,
        crate::web::auth::update_profile_handler,
    ),
    components(
        schemas(
            GenerateSummaryResponse,
            SavedListResponse,
            SaveRecordResponse,
            AuthResponse,
            LoginRequest,
            RegisterRequest,
            ProfileUpdateRequest,
        )
    ),
    tags(
        (name = "Mintar Companion API", description = "Summaries of uploaded PDFs and the on-device collection of saved study material.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

/// The study material generated for an uploaded document.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSummaryResponse {
    #[schema(value_type = Object)]
    pub summary: StudySummary,
    pub topic_count: usize,
    pub question_count: usize,
}

/// The saved collection as list cards, newest first.
#[derive(Serialize, ToSchema)]
pub struct SavedListResponse {
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<RecordSummary>,
}

/// The response payload sent after a summary has been saved.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecordResponse {
    pub id: String,
    pub saved_at: String,
    /// Number of valid records in the collection after the save.
    pub total: usize,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn store_failure(action: &str, e: StoreError) -> (StatusCode, String) {
    error!("Failed to {}: {:?}", action, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to {}", action),
    )
}

fn summarize_failure(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::RateLimited(message) => (StatusCode::TOO_MANY_REQUESTS, message),
        PortError::UnsupportedDocument => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "The uploaded file is not study material or its format is not recognised".to_string(),
        ),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        other => {
            error!("Failed to generate summary: {:?}", other);
            (
                StatusCode::BAD_GATEWAY,
                "An error occurred while processing the file".to_string(),
            )
        }
    }
}

fn is_pdf(file_name: &str, content_type: Option<&str>) -> bool {
    content_type == Some("application/pdf") || file_name.to_ascii_lowercase().ends_with(".pdf")
}

//=========================================================================================
// Summary Generation
//=========================================================================================

/// Upload a PDF and generate study material from it.
///
/// Accepts a multipart/form-data request with a single file part. The stored
/// login token is forwarded when present; anonymous uploads use the trial quota.
#[utoipa::path(
    post,
    path = "/summaries",
    request_body(content_type = "multipart/form-data", description = "The PDF to summarize."),
    responses(
        (status = 200, description = "Study material generated", body = GenerateSummaryResponse),
        (status = 400, description = "Missing file"),
        (status = 415, description = "The file is not a PDF"),
        (status = 422, description = "The PDF is not study material"),
        (status = 429, description = "Trial quota exhausted"),
        (status = 502, description = "The remote API failed")
    )
)]
pub async fn generate_summary_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read multipart data: {}", e),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Multipart form must include a PDF file".to_string(),
            )
        })?;

    let file_name = field.file_name().unwrap_or("document.pdf").to_string();
    let content_type = field.content_type().map(str::to_string);
    if !is_pdf(&file_name, content_type.as_deref()) {
        return Err((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Only PDF files can be summarized".to_string(),
        ));
    }

    let bytes = field.bytes().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read file bytes: {}", e),
        )
    })?;

    let token = app_state.sessions.token().await.map_err(|e| {
        error!("Failed to read login token: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read login state".to_string(),
        )
    })?;

    let upload = DocumentUpload {
        file_name,
        mime_type: content_type.unwrap_or_else(|| "application/pdf".to_string()),
        bytes: bytes.to_vec(),
    };

    let summary = app_state
        .summarizer
        .summarize(upload, token.as_deref())
        .await
        .map_err(summarize_failure)?;

    info!(
        topics = summary.materials.len(),
        questions = summary.question_count(),
        "Summary generated"
    );
    Ok(Json(GenerateSummaryResponse {
        topic_count: summary.materials.len(),
        question_count: summary.question_count(),
        summary,
    }))
}

//=========================================================================================
// Saved Collection
//=========================================================================================

/// List the saved summaries, newest first.
#[utoipa::path(
    get,
    path = "/saved",
    responses(
        (status = 200, description = "The saved collection", body = SavedListResponse),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn list_saved_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let records = app_state
        .store
        .list()
        .await
        .map_err(|e| store_failure("load saved summaries", e))?;

    let items = records
        .iter()
        .enumerate()
        .map(|(position, record)| record.summary(position))
        .collect();
    Ok(Json(SavedListResponse { items }))
}

/// Save a generated summary to the on-device collection.
#[utoipa::path(
    post,
    path = "/saved",
    request_body(content_type = "application/json", description = "The study material returned by /summaries."),
    responses(
        (status = 201, description = "Summary saved", body = SaveRecordResponse),
        (status = 400, description = "Nothing to save"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn save_record_handler(
    State(app_state): State<Arc<AppState>>,
    Json(summary): Json<StudySummary>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if summary.materials.is_empty() {
        warn!("Refusing to save a summary without material");
        return Err((StatusCode::BAD_REQUEST, "There is no data to save".to_string()));
    }

    let record = SavedRecord::from_summary(summary, Utc::now());
    let (id, saved_at) = (record.id.clone(), record.saved_at.clone());

    let snapshot = app_state
        .store
        .append(record)
        .await
        .map_err(|e| store_failure("save the summary", e))?;

    Ok((
        StatusCode::CREATED,
        Json(SaveRecordResponse {
            id,
            saved_at,
            total: snapshot.len(),
        }),
    ))
}

/// Fetch one saved summary with all of its material.
#[utoipa::path(
    get,
    path = "/saved/{id}",
    params(("id" = String, Path, description = "The saved record id.")),
    responses(
        (status = 200, description = "The saved record"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "No record with this id"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn get_saved_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let record = app_state
        .store
        .get_by_id(&id)
        .await
        .map_err(|e| store_failure("load the summary", e))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Saved summary {} not found", id)))?;

    Ok(Json(record))
}

/// Delete a saved summary. Deleting an unknown id succeeds.
#[utoipa::path(
    delete,
    path = "/saved/{id}",
    params(("id" = String, Path, description = "The saved record id.")),
    responses(
        (status = 204, description = "Deleted (or already absent)"),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn delete_saved_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .store
        .delete_by_id(&id)
        .await
        .map_err(|e| store_failure("delete the summary", e))?;

    Ok(StatusCode::NO_CONTENT)
}
