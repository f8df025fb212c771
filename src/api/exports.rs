// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{CourtExport, ExportFormat, ExportRepository},
};

/// Response header carrying the hex SHA-256 of the body.
pub const DIGEST_HEADER: &str = "x-content-sha256";

#[utoipa::path(
    get,
    path = "/api/exports/{id}",
    tag = "Exports",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Export ID")),
    responses(
        (status = 200, description = "Export with its document", body = CourtExport),
        (status = 404, description = "Export not found")
    )
)]
pub async fn get_export(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourtExport>, ApiError> {
    Ok(Json(ExportRepository::new(&state.db).get(&id)?))
}

/// The stored document exactly as digested.
#[utoipa::path(
    get,
    path = "/api/exports/{id}/download",
    tag = "Exports",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Export ID")),
    responses(
        (status = 200, description = "Export document"),
        (status = 404, description = "Export not found")
    )
)]
pub async fn download_export(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let export = ExportRepository::new(&state.db).get(&id)?;
    if !export.verify_digest() {
        return Err(ApiError::internal(format!(
            "stored export {} does not match its digest",
            export.export_number
        )));
    }
    tracing::info!(export = %export.export_number, user_id = %user.user_id, "Export downloaded");

    let extension = match export.format {
        ExportFormat::Json => "json",
        ExportFormat::Text => "txt",
    };
    let disposition = format!("attachment; filename=\"{}.{extension}\"", export.export_number);
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(export.format.content_type())),
        (
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition).map_err(ApiError::internal)?,
        ),
        (
            HeaderName::from_static(DIGEST_HEADER),
            HeaderValue::from_str(&export.digest).map_err(ApiError::internal)?,
        ),
    ];
    Ok((headers, export.content).into_response())
}
