// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet watchlist endpoints.
//!
//! Addresses are normalized per chain before the uniqueness check, so the
//! same EVM address in two letter cases is one wallet. Create and update are
//! audited.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::extract::{ApiJson, ApiQuery};
use super::{audited_response, AuditedResponse, ListResponse};
use crate::{
    auth::{Auth, Role, Writer},
    error::ApiError,
    state::AppState,
    storage::{
        repository::kyc::mask_document_number, AuditContext, KycRecord, KycRepository, NewKycRecord,
        NewWallet, Pagination, TracedTransaction, TransactionRepository, WalletFilter, WalletPatch,
        WalletRepository, WatchedWallet,
    },
};

#[utoipa::path(
    get,
    path = "/api/wallets",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    params(WalletFilter, Pagination),
    responses(
        (status = 200, description = "Wallets, highest risk first", body = ListResponse<WatchedWallet>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_wallets(
    Auth(_user): Auth,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<WalletFilter>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ListResponse<WatchedWallet>>, ApiError> {
    let page = WalletRepository::new(&state.db).list(&filter, pagination)?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    post,
    path = "/api/wallets",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    request_body = NewWallet,
    responses(
        (status = 201, description = "Wallet added to the watchlist", body = AuditedResponse<WatchedWallet>),
        (status = 400, description = "Invalid address or unknown case"),
        (status = 403, description = "Read-only role"),
        (status = 409, description = "Address already watched")
    )
)]
pub async fn create_wallet(
    Writer(user): Writer,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewWallet>,
) -> Result<(StatusCode, Json<AuditedResponse<WatchedWallet>>), ApiError> {
    let audited = WalletRepository::new(&state.db).create(&AuditContext::from(&user), request)?;
    tracing::info!(
        wallet_id = %audited.record.id,
        blockchain = %audited.record.blockchain,
        risk_score = audited.record.risk_score,
        user_id = %user.user_id,
        "Wallet added to watchlist"
    );
    Ok((StatusCode::CREATED, Json(audited_response(&state, audited))))
}

#[utoipa::path(
    get,
    path = "/api/wallets/{id}",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Wallet ID")),
    responses(
        (status = 200, description = "Wallet", body = WatchedWallet),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn get_wallet(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WatchedWallet>, ApiError> {
    Ok(Json(WalletRepository::new(&state.db).get(&id)?))
}

#[utoipa::path(
    patch,
    path = "/api/wallets/{id}",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Wallet ID")),
    request_body = WalletPatch,
    responses(
        (status = 200, description = "Wallet updated", body = AuditedResponse<WatchedWallet>),
        (status = 400, description = "Invalid update"),
        (status = 403, description = "Read-only role"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn update_wallet(
    Writer(user): Writer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<WalletPatch>,
) -> Result<Json<AuditedResponse<WatchedWallet>>, ApiError> {
    let audited = WalletRepository::new(&state.db).update(&AuditContext::from(&user), &id, patch)?;
    Ok(Json(audited_response(&state, audited)))
}

/// Traced transactions sending from or to the wallet's address.
#[utoipa::path(
    get,
    path = "/api/wallets/{id}/transactions",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Wallet ID"), Pagination),
    responses(
        (status = 200, description = "Transactions, newest first", body = ListResponse<TracedTransaction>),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn wallet_transactions(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ListResponse<TracedTransaction>>, ApiError> {
    let wallet = WalletRepository::new(&state.db).get(&id)?;
    let page = TransactionRepository::new(&state.db).for_address(wallet.blockchain, &wallet.address, pagination)?;
    Ok(Json(page.into()))
}

/// KYC records for a wallet. Auditors see masked document numbers.
#[utoipa::path(
    get,
    path = "/api/wallets/{id}/kyc",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Wallet ID")),
    responses(
        (status = 200, description = "KYC records, newest first", body = Vec<KycRecord>),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn list_wallet_kyc(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<KycRecord>>, ApiError> {
    WalletRepository::new(&state.db).get(&id)?;
    let mut records = KycRepository::new(&state.db).for_wallet(&id)?;
    if user.role == Role::Auditor {
        for record in &mut records {
            record.id_document_number = mask_document_number(&record.id_document_number);
        }
    }
    Ok(Json(records))
}

#[utoipa::path(
    post,
    path = "/api/wallets/{id}/kyc",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Wallet ID")),
    request_body = NewKycRecord,
    responses(
        (status = 201, description = "KYC record attached", body = KycRecord),
        (status = 400, description = "Invalid record"),
        (status = 403, description = "Read-only role"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn create_wallet_kyc(
    Writer(user): Writer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<NewKycRecord>,
) -> Result<(StatusCode, Json<KycRecord>), ApiError> {
    let record = KycRepository::new(&state.db).create(&AuditContext::from(&user), &id, request)?;
    tracing::info!(wallet_id = %id, kyc_id = %record.id, user_id = %user.user_id, "KYC record attached");
    Ok((StatusCode::CREATED, Json(record)))
}
