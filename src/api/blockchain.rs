// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Confirmation nodes and the audit ledger.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::extract::{ApiJson, ApiQuery};
use super::ListResponse;
use crate::{
    auth::{AdminOnly, Auth},
    blockchain::{
        hashing::{verify_chain, ChainVerification},
        BlockchainNode, LedgerEntry,
    },
    error::ApiError,
    state::AppState,
    storage::{LedgerFilter, LedgerRepository, NewNode, NodeFilter, NodePatch, NodeRepository, Pagination},
};

#[utoipa::path(
    get,
    path = "/api/blockchain/nodes",
    tag = "Blockchain",
    security(("bearer_auth" = [])),
    params(NodeFilter),
    responses(
        (status = 200, description = "Confirmation nodes", body = Vec<BlockchainNode>)
    )
)]
pub async fn list_nodes(
    Auth(_user): Auth,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<NodeFilter>,
) -> Result<Json<Vec<BlockchainNode>>, ApiError> {
    Ok(Json(NodeRepository::new(&state.db).list(&filter)?))
}

#[utoipa::path(
    post,
    path = "/api/blockchain/nodes",
    tag = "Blockchain",
    security(("bearer_auth" = [])),
    request_body = NewNode,
    responses(
        (status = 201, description = "Node registered", body = BlockchainNode),
        (status = 400, description = "Invalid node"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Node name already taken")
    )
)]
pub async fn create_node(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewNode>,
) -> Result<(StatusCode, Json<BlockchainNode>), ApiError> {
    let node = NodeRepository::new(&state.db).create(request)?;
    tracing::info!(node = %node.name, user_id = %admin.user_id, "Confirmation node registered");
    Ok((StatusCode::CREATED, Json(node)))
}

#[utoipa::path(
    patch,
    path = "/api/blockchain/nodes/{id}",
    tag = "Blockchain",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Node ID")),
    request_body = NodePatch,
    responses(
        (status = 200, description = "Node updated", body = BlockchainNode),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Node not found")
    )
)]
pub async fn update_node(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<NodePatch>,
) -> Result<Json<BlockchainNode>, ApiError> {
    Ok(Json(NodeRepository::new(&state.db).update(&id, patch)?))
}

#[utoipa::path(
    get,
    path = "/api/blockchain/transactions",
    tag = "Blockchain",
    security(("bearer_auth" = [])),
    params(LedgerFilter, Pagination),
    responses(
        (status = 200, description = "Audit rows, newest first", body = ListResponse<LedgerEntry>)
    )
)]
pub async fn list_ledger(
    Auth(_user): Auth,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<LedgerFilter>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ListResponse<LedgerEntry>>, ApiError> {
    Ok(Json(LedgerRepository::new(&state.db).list(&filter, pagination)?.into()))
}

#[utoipa::path(
    get,
    path = "/api/blockchain/transactions/{id}",
    tag = "Blockchain",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Audit row ID")),
    responses(
        (status = 200, description = "Audit row", body = LedgerEntry),
        (status = 404, description = "Audit row not found")
    )
)]
pub async fn get_ledger_entry(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LedgerEntry>, ApiError> {
    Ok(Json(LedgerRepository::new(&state.db).get(&id)?))
}

/// Recompute every hash in the chain.
#[utoipa::path(
    get,
    path = "/api/blockchain/verify",
    tag = "Blockchain",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Chain verification result", body = ChainVerification)
    )
)]
pub async fn verify(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<ChainVerification>, ApiError> {
    let entries = LedgerRepository::new(&state.db).in_sequence()?;
    let result = verify_chain(&entries);
    if !result.valid {
        tracing::warn!(
            user_id = %user.user_id,
            checked = result.checked,
            first_invalid = ?result.first_invalid.as_ref().map(|b| b.sequence),
            "Audit chain verification failed"
        );
    }
    Ok(Json(result))
}
