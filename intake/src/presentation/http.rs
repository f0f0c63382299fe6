// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # HTTP Surface
//!
//! Thin axum layer over the intake service. Routes map 1:1 onto pipeline
//! operations; handlers translate transport concerns (multipart uploads,
//! JSON bodies, the `X-User-Id` identity header) and map the error taxonomy
//! onto status codes:
//!
//! | error | status |
//! |---|---|
//! | `NotAuthenticated` | 401 |
//! | `NotFound` | 404 |
//! | `PackageBusy`, `StateTransitionInvalid`, `ConflictUnresolved`, `ConflictAlreadyResolved`, `DuplicateBusinessIdentifier` | 409 |
//! | `ValidationFailed`, `ManifestInvalid`, `FkUnresolvable` | 422 |
//! | `TransportError` | 400 |
//! | everything else | 500 |
//!
//! Authentication itself is out of scope; the gateway in front of this
//! service authenticates and forwards the user id.

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use tenure_intake_domain::entities::conflict_resolution::ConflictDecision;
use tenure_intake_domain::entities::ImportMethod;
use tenure_intake_domain::services::ports::CurrentUser;
use tenure_intake_domain::IntakeError;

use crate::application::commands::{
    CancelPackageCommand, ReceivePackageCommand, ResolveConflictCommand,
};
use crate::application::services::IntakeService;

/// Uploads can carry attachments; cap the body well above typical packages.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IntakeService>,
}

/// Request-scoped identity resolved from the `X-User-Id` header.
pub struct HeaderCurrentUser {
    user_id: Option<Uuid>,
}

impl HeaderCurrentUser {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_id = headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::from_str(v).ok());
        HeaderCurrentUser { user_id }
    }
}

impl CurrentUser for HeaderCurrentUser {
    fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }
}

struct ApiError(IntakeError);

impl From<IntakeError> for ApiError {
    fn from(e: IntakeError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IntakeError::NotAuthenticated(_) => StatusCode::UNAUTHORIZED,
            IntakeError::NotFound(_) => StatusCode::NOT_FOUND,
            IntakeError::PackageBusy(_)
            | IntakeError::StateTransitionInvalid(_)
            | IntakeError::ConflictUnresolved(_)
            | IntakeError::ConflictAlreadyResolved(_)
            | IntakeError::DuplicateBusinessIdentifier(_) => StatusCode::CONFLICT,
            IntakeError::ValidationFailed(_)
            | IntakeError::ManifestInvalid(_)
            | IntakeError::FkUnresolvable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IntakeError::TransportError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({
            "error": self.0.to_string(),
            "category": self.0.category(),
        }));
        (status, body).into_response()
    }
}

pub fn intake_router(state: AppState) -> Router {
    Router::new()
        .route("/imports", post(upload_package).get(list_packages))
        .route("/imports/:id", get(get_package))
        .route("/imports/:id/validate", post(validate_package))
        .route("/imports/:id/detect-duplicates", post(detect_duplicates))
        .route("/imports/:id/staged-entities", get(staged_entities))
        .route("/imports/:id/conflicts", get(list_conflicts))
        .route("/imports/:id/commit", post(commit_package))
        .route("/imports/:id/cancel", post(cancel_package))
        .route("/conflicts/:id/resolve", post(resolve_conflict))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// `POST /imports` - multipart upload. An optional `import_method` field
/// must precede the `archive` file field; the archive streams to disk
/// without ever being buffered whole.
async fn upload_package(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let user = HeaderCurrentUser::from_headers(&headers);
    let mut import_method = ImportMethod::Manual;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| IntakeError::transport(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("import_method") => {
                let text = field.text().await.map_err(|e| IntakeError::transport(e.to_string()))?;
                import_method = ImportMethod::from_str(&text)?;
            }
            Some("archive") => {
                let file_name = field.file_name().unwrap_or("package.uhc").to_string();
                let command = ReceivePackageCommand {
                    file_name,
                    import_method,
                    user_id: user.user_id(),
                };
                let stream = Box::pin(field)
                    .map(|chunk| chunk.map_err(|e| IntakeError::transport(e.to_string())));
                let result = state.service.receive_package(command, stream).await?;
                let status = if result.is_duplicate_package {
                    StatusCode::OK
                } else {
                    StatusCode::CREATED
                };
                return Ok((status, Json(result)).into_response());
            }
            _ => continue,
        }
    }
    Err(IntakeError::transport("multipart upload is missing the archive field".to_string()).into())
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    offset: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    50
}

async fn list_packages(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let packages = state.service.packages(page.offset, page.limit.min(500)).await?;
    Ok(Json(packages))
}

async fn get_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.package(id).await?))
}

async fn validate_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = HeaderCurrentUser::from_headers(&headers);
    let outcome = state.service.validate_package(id, user.user_id()).await?;
    Ok(Json(outcome))
}

async fn detect_duplicates(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = HeaderCurrentUser::from_headers(&headers);
    let outcome = state.service.detect_duplicates(id, user.user_id()).await?;
    Ok(Json(outcome))
}

async fn staged_entities(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.staged_entities(id).await?))
}

async fn list_conflicts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.conflicts(id).await?))
}

#[derive(Deserialize)]
struct ResolveBody {
    decision: String,
    chosen_master_id: Option<Uuid>,
    justification: String,
}

async fn resolve_conflict(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<ResolveBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user = HeaderCurrentUser::from_headers(&headers);
    let command = ResolveConflictCommand {
        conflict_id: id,
        decision: ConflictDecision::from_str(&body.decision)?,
        chosen_master_id: body.chosen_master_id,
        justification: body.justification,
        user_id: user.user_id(),
    };
    Ok(Json(state.service.resolve_conflict(command).await?))
}

async fn commit_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = HeaderCurrentUser::from_headers(&headers);
    Ok(Json(state.service.commit_package(id, user.user_id()).await?))
}

#[derive(Deserialize)]
struct CancelBody {
    reason: String,
    #[serde(default)]
    cleanup_staging: bool,
}

async fn cancel_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<CancelBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user = HeaderCurrentUser::from_headers(&headers);
    let command = CancelPackageCommand {
        package_id: id,
        reason: body.reason,
        cleanup_staging: body.cleanup_staging,
        user_id: user.user_id(),
    };
    Ok(Json(state.service.cancel_package(command).await?))
}
