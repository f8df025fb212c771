// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Traced on-chain transactions attached to cases.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::extract::{ApiJson, ApiQuery};
use super::ListResponse;
use crate::{
    auth::{Auth, Writer},
    error::ApiError,
    state::AppState,
    storage::{
        AuditContext, NewTransaction, Pagination, TracedTransaction, TransactionFilter, TransactionPatch,
        TransactionRepository,
    },
};

#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "Transactions",
    security(("bearer_auth" = [])),
    params(TransactionFilter, Pagination),
    responses(
        (status = 200, description = "Transactions", body = ListResponse<TracedTransaction>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_transactions(
    Auth(_user): Auth,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<TransactionFilter>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ListResponse<TracedTransaction>>, ApiError> {
    let page = TransactionRepository::new(&state.db).list(&filter, pagination)?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    post,
    path = "/api/transactions",
    tag = "Transactions",
    security(("bearer_auth" = [])),
    request_body = NewTransaction,
    responses(
        (status = 201, description = "Transaction recorded", body = TracedTransaction),
        (status = 400, description = "Invalid transaction or unknown case"),
        (status = 403, description = "Read-only role"),
        (status = 409, description = "Transaction hash already recorded")
    )
)]
pub async fn create_transaction(
    Writer(user): Writer,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewTransaction>,
) -> Result<(StatusCode, Json<TracedTransaction>), ApiError> {
    let tx = TransactionRepository::new(&state.db).create(&AuditContext::from(&user), request)?;
    tracing::info!(transaction_id = %tx.id, case_id = %tx.case_id, "Transaction recorded");
    Ok((StatusCode::CREATED, Json(tx)))
}

#[utoipa::path(
    get,
    path = "/api/transactions/{id}",
    tag = "Transactions",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction", body = TracedTransaction),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn get_transaction(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TracedTransaction>, ApiError> {
    Ok(Json(TransactionRepository::new(&state.db).get(&id)?))
}

#[utoipa::path(
    patch,
    path = "/api/transactions/{id}",
    tag = "Transactions",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Transaction ID")),
    request_body = TransactionPatch,
    responses(
        (status = 200, description = "Transaction updated", body = TracedTransaction),
        (status = 403, description = "Read-only role"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn update_transaction(
    Writer(_user): Writer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TransactionPatch>,
) -> Result<Json<TracedTransaction>, ApiError> {
    Ok(Json(TransactionRepository::new(&state.db).update(&id, patch)?))
}
