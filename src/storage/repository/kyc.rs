// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! KYC details obtained from exchanges for watched wallets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::audit::AuditContext;
use super::super::database::{
    ensure_exists, put_json, Database, Record, StorageError, StorageResult, KYC, WALLETS,
};
use crate::models::{limit_text, require_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdDocumentType {
    Aadhaar,
    Pan,
    Passport,
    DrivingLicence,
    VoterId,
    Other,
}

/// How the record was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KycSource {
    /// Response to a notice served on the exchange
    ExchangeResponse,
    /// Produced by an investigator
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KycRecord {
    pub id: String,
    pub wallet_id: String,
    pub exchange: String,
    pub holder_name: String,
    pub id_document_type: IdDocumentType,
    pub id_document_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub verified: bool,
    pub source: KycSource,
    pub recorded_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for KycRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewKycRecord {
    pub exchange: String,
    pub holder_name: String,
    pub id_document_type: IdDocumentType,
    pub id_document_number: String,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default = "default_source")]
    pub source: KycSource,
}

fn default_source() -> KycSource {
    KycSource::ExchangeResponse
}

impl NewKycRecord {
    fn validate(&self) -> Result<(), String> {
        require_text("exchange", &self.exchange, 100)?;
        require_text("holder_name", &self.holder_name, 200)?;
        require_text("id_document_number", &self.id_document_number, 50)?;
        limit_text("nationality", self.nationality.as_deref(), 60)?;
        limit_text("phone", self.phone.as_deref(), 30)?;
        if let Some(email) = &self.email {
            crate::models::validate_email("email", email)?;
        }
        Ok(())
    }
}

/// Mask all but the last four characters of a document number.
pub fn mask_document_number(number: &str) -> String {
    let chars: Vec<char> = number.chars().collect();
    let visible = chars.len().min(4);
    let hidden = chars.len() - visible;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}

pub struct KycRepository<'a> {
    db: &'a Database,
}

impl<'a> KycRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Records for one wallet, newest first.
    pub fn for_wallet(&self, wallet_id: &str) -> StorageResult<Vec<KycRecord>> {
        let mut rows: Vec<KycRecord> = self.db.fetch_all(KYC)?;
        rows.retain(|k| k.wallet_id == wallet_id);
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    /// Attach a record to an existing wallet.
    ///
    /// The wallet comes from the request path, so a missing wallet is
    /// reported as not found rather than as a dangling reference.
    pub fn create(&self, ctx: &AuditContext, wallet_id: &str, new: NewKycRecord) -> StorageResult<KycRecord> {
        new.validate().map_err(StorageError::Validation)?;
        let record = KycRecord {
            id: uuid::Uuid::new_v4().to_string(),
            wallet_id: wallet_id.to_string(),
            exchange: new.exchange.trim().to_string(),
            holder_name: new.holder_name.trim().to_string(),
            id_document_type: new.id_document_type,
            id_document_number: new.id_document_number.trim().to_string(),
            nationality: new.nationality,
            phone: new.phone,
            email: new.email,
            verified: new.verified,
            source: new.source,
            recorded_by: ctx.actor_user_id.clone(),
            created_at: Utc::now(),
        };
        self.db.write(|txn| {
            ensure_exists(txn, WALLETS, wallet_id, "wallet").map_err(|_| {
                StorageError::NotFound(format!("wallet {wallet_id}"))
            })?;
            put_json(txn, KYC, &record)
        })?;
        Ok(record)
    }
}
