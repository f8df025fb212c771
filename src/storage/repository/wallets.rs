// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet watchlist repository.
//!
//! Addresses are normalized per chain and unique per `(blockchain, address)`.
//! Creates and updates are audited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::super::audit::{AuditContext, Audited, Mutation};
use super::super::database::{
    claim_unique, ensure_exists, lookup_unique, put_json, require_json, Database, Page,
    Pagination, Record, StorageError, StorageResult, CASES, WALLETS, WALLET_ADDRESSES,
};
use super::timeline::TimelineEventType;
use crate::blockchain::{EntityKind, LedgerAction};
use crate::models::{limit_text, Blockchain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    /// Under observation
    Monitoring,
    /// Confirmed as involved in fraud
    Flagged,
    /// Freeze requested at the exchange
    Frozen,
    /// Investigated and found clean
    Cleared,
}

impl Default for WalletStatus {
    fn default() -> Self {
        Self::Monitoring
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Bucket a 0-100 risk score.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=24 => RiskLevel::Low,
            25..=49 => RiskLevel::Medium,
            50..=74 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WatchedWallet {
    pub id: String,
    /// Normalized address.
    pub address: String,
    pub blockchain: Blockchain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub risk_score: u8,
    /// Always derived from `risk_score`.
    pub risk_level: RiskLevel,
    pub status: WalletStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for WatchedWallet {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewWallet {
    pub address: String,
    pub blockchain: Blockchain,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub risk_score: u8,
    #[serde(default)]
    pub status: WalletStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub case_id: Option<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct WalletPatch {
    pub label: Option<String>,
    pub risk_score: Option<u8>,
    pub status: Option<WalletStatus>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub case_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct WalletFilter {
    pub blockchain: Option<Blockchain>,
    pub status: Option<WalletStatus>,
    pub risk_level: Option<RiskLevel>,
    pub case_id: Option<String>,
    /// Substring match on address or label.
    pub q: Option<String>,
}

impl WalletFilter {
    fn matches(&self, wallet: &WatchedWallet) -> bool {
        self.blockchain.is_none_or(|b| wallet.blockchain == b)
            && self.status.is_none_or(|s| wallet.status == s)
            && self.risk_level.is_none_or(|r| wallet.risk_level == r)
            && self
                .case_id
                .as_deref()
                .is_none_or(|c| wallet.case_id.as_deref() == Some(c))
            && self.q.as_deref().is_none_or(|q| {
                let q = q.to_lowercase();
                wallet.address.to_lowercase().contains(&q)
                    || wallet
                        .label
                        .as_deref()
                        .is_some_and(|l| l.to_lowercase().contains(&q))
            })
    }
}

fn validate_score(score: u8) -> Result<(), String> {
    if score > 100 {
        return Err("risk_score must be between 0 and 100".to_string());
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), String> {
    if tags.len() > 20 {
        return Err("at most 20 tags are allowed".to_string());
    }
    for tag in tags {
        if tag.trim().is_empty() || tag.chars().count() > 40 {
            return Err("tags must be 1-40 characters".to_string());
        }
    }
    Ok(())
}

/// Index key for `(blockchain, normalized address)`.
pub(crate) fn address_key(blockchain: Blockchain, address: &str) -> String {
    format!("{}:{}", blockchain.as_str(), address)
}

pub struct WalletRepository<'a> {
    db: &'a Database,
}

impl<'a> WalletRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, id: &str) -> StorageResult<WatchedWallet> {
        self.db
            .fetch(WALLETS, id)?
            .ok_or_else(|| StorageError::NotFound(format!("wallet {id}")))
    }

    /// Look up a watched address (normalized before lookup).
    pub fn find_by_address(&self, blockchain: Blockchain, address: &str) -> StorageResult<Option<WatchedWallet>> {
        let Ok(address) = blockchain.normalize_address(address) else {
            return Ok(None);
        };
        let key = address_key(blockchain, &address);
        let id = self.db.read(|txn| {
            let index = txn.open_table(WALLET_ADDRESSES)?;
            lookup_unique(&index, &key)
        })?;
        match id {
            Some(id) => self.db.fetch(WALLETS, &id),
            None => Ok(None),
        }
    }

    /// Highest risk first, then newest.
    pub fn list(&self, filter: &WalletFilter, pagination: Pagination) -> StorageResult<Page<WatchedWallet>> {
        let mut rows: Vec<WatchedWallet> = self.db.fetch_all(WALLETS)?;
        rows.retain(|w| filter.matches(w));
        rows.sort_by(|a, b| {
            b.risk_score
                .cmp(&a.risk_score)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(Page::from_vec(rows, pagination))
    }

    pub fn all(&self) -> StorageResult<Vec<WatchedWallet>> {
        self.db.fetch_all(WALLETS)
    }

    pub fn create(&self, ctx: &AuditContext, new: NewWallet) -> StorageResult<Audited<WatchedWallet>> {
        let address = new
            .blockchain
            .normalize_address(&new.address)
            .map_err(StorageError::Validation)?;
        validate_score(new.risk_score).map_err(StorageError::Validation)?;
        validate_tags(&new.tags).map_err(StorageError::Validation)?;
        limit_text("label", new.label.as_deref(), 200).map_err(StorageError::Validation)?;
        limit_text("notes", new.notes.as_deref(), 5_000).map_err(StorageError::Validation)?;

        self.db.audited(ctx, EntityKind::Wallet, LedgerAction::Create, |txn, now| {
            if let Some(case_id) = &new.case_id {
                ensure_exists(txn, CASES, case_id, "case")?;
            }
            let wallet = WatchedWallet {
                id: uuid::Uuid::new_v4().to_string(),
                address,
                blockchain: new.blockchain,
                label: new.label,
                risk_score: new.risk_score,
                risk_level: RiskLevel::from_score(new.risk_score),
                status: new.status,
                notes: new.notes,
                tags: new.tags,
                case_id: new.case_id,
                created_by: ctx.actor_user_id.clone(),
                created_at: now,
                updated_at: now,
            };
            claim_unique(
                txn,
                WALLET_ADDRESSES,
                &address_key(wallet.blockchain, &wallet.address),
                &wallet.id,
                "wallet address",
            )?;
            put_json(txn, WALLETS, &wallet)?;

            let case_id = wallet.case_id.clone();
            let description = format!(
                "Wallet {} ({}) added to watchlist",
                wallet.address, wallet.blockchain
            );
            let mutation = Mutation::new(wallet);
            Ok(match case_id {
                Some(case_id) => mutation.with_timeline(case_id, TimelineEventType::WalletAdded, description),
                None => mutation,
            })
        })
    }

    pub fn update(&self, ctx: &AuditContext, id: &str, patch: WalletPatch) -> StorageResult<Audited<WatchedWallet>> {
        if let Some(score) = patch.risk_score {
            validate_score(score).map_err(StorageError::Validation)?;
        }
        if let Some(tags) = &patch.tags {
            validate_tags(tags).map_err(StorageError::Validation)?;
        }
        limit_text("label", patch.label.as_deref(), 200).map_err(StorageError::Validation)?;
        limit_text("notes", patch.notes.as_deref(), 5_000).map_err(StorageError::Validation)?;

        self.db.audited(ctx, EntityKind::Wallet, LedgerAction::Update, |txn, now| {
            let mut wallet: WatchedWallet = require_json(txn, WALLETS, id, "wallet")?;
            let mut changes = Vec::new();

            if let Some(case_id) = patch.case_id {
                ensure_exists(txn, CASES, &case_id, "case")?;
                wallet.case_id = Some(case_id);
                changes.push("linked case".to_string());
            }
            if let Some(score) = patch.risk_score {
                wallet.risk_score = score;
                wallet.risk_level = RiskLevel::from_score(score);
                changes.push(format!("risk score {score}"));
            }
            if let Some(status) = patch.status {
                if status != wallet.status {
                    changes.push(format!(
                        "status {}",
                        serde_json::to_value(status)?.as_str().unwrap_or_default()
                    ));
                }
                wallet.status = status;
            }
            if let Some(label) = patch.label {
                wallet.label = Some(label);
            }
            if let Some(notes) = patch.notes {
                wallet.notes = Some(notes);
            }
            if let Some(tags) = patch.tags {
                wallet.tags = tags;
            }
            wallet.updated_at = now;
            put_json(txn, WALLETS, &wallet)?;

            let case_id = wallet.case_id.clone();
            let description = if changes.is_empty() {
                format!("Wallet {} details updated", wallet.address)
            } else {
                format!("Wallet {} updated: {}", wallet.address, changes.join(", "))
            };
            let mutation = Mutation::new(wallet);
            Ok(match case_id {
                Some(case_id) => mutation.with_timeline(case_id, TimelineEventType::WalletUpdated, description),
                None => mutation,
            })
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::repository::cases::tests::{ctx, new_case};
    use crate::storage::{CaseRepository, LedgerRepository, TimelineRepository};

    pub(crate) const EVM_ADDRESS: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    pub(crate) fn new_wallet(address: &str) -> NewWallet {
        NewWallet {
            address: address.to_string(),
            blockchain: Blockchain::Ethereum,
            label: Some("Mule account".to_string()),
            risk_score: 60,
            status: WalletStatus::Monitoring,
            notes: None,
            tags: vec!["mule".to_string()],
            case_id: None,
        }
    }

    #[test]
    fn risk_level_buckets() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(24), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(25), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(74), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(75), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Critical);
    }

    #[test]
    fn address_is_normalized_and_unique() {
        let db = Database::in_memory().unwrap();
        let repo = WalletRepository::new(&db);
        let wallet = repo.create(&ctx(), new_wallet(EVM_ADDRESS)).unwrap().record;
        assert_eq!(wallet.address, EVM_ADDRESS.to_lowercase());
        assert_eq!(wallet.risk_level, RiskLevel::High);

        let err = repo
            .create(&ctx(), new_wallet(&EVM_ADDRESS.to_lowercase()))
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        // Same address on another EVM chain is a different wallet
        let mut polygon = new_wallet(EVM_ADDRESS);
        polygon.blockchain = Blockchain::Polygon;
        repo.create(&ctx(), polygon).unwrap();

        let found = repo
            .find_by_address(Blockchain::Ethereum, EVM_ADDRESS)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, wallet.id);
        assert_eq!(LedgerRepository::new(&db).height().unwrap(), 2);
    }

    #[test]
    fn invalid_address_and_score_are_rejected() {
        let db = Database::in_memory().unwrap();
        let repo = WalletRepository::new(&db);
        assert!(matches!(
            repo.create(&ctx(), new_wallet("0x1234")),
            Err(StorageError::Validation(_))
        ));
        let mut bad = new_wallet(EVM_ADDRESS);
        bad.risk_score = 101;
        assert!(matches!(repo.create(&ctx(), bad), Err(StorageError::Validation(_))));
    }

    #[test]
    fn dangling_case_is_a_foreign_key_error() {
        let db = Database::in_memory().unwrap();
        let mut wallet = new_wallet(EVM_ADDRESS);
        wallet.case_id = Some("no-case".into());
        assert!(matches!(
            WalletRepository::new(&db).create(&ctx(), wallet),
            Err(StorageError::ForeignKey(_))
        ));
    }

    #[test]
    fn update_rederives_risk_level_and_logs_timeline() {
        let db = Database::in_memory().unwrap();
        let case = CaseRepository::new(&db).create(&ctx(), new_case("Case")).unwrap().record;
        let mut new = new_wallet(EVM_ADDRESS);
        new.case_id = Some(case.id.clone());
        let repo = WalletRepository::new(&db);
        let wallet = repo.create(&ctx(), new).unwrap().record;

        let updated = repo
            .update(
                &ctx(),
                &wallet.id,
                WalletPatch {
                    risk_score: Some(90),
                    status: Some(WalletStatus::Frozen),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.record.risk_level, RiskLevel::Critical);
        assert_eq!(updated.record.status, WalletStatus::Frozen);
        assert_eq!(updated.ledger.action, LedgerAction::Update);

        let timeline = TimelineRepository::new(&db).for_case(&case.id).unwrap();
        assert_eq!(timeline.len(), 3);
        assert!(timeline[2].description.contains("frozen"));
    }

    #[test]
    fn list_orders_by_risk() {
        let db = Database::in_memory().unwrap();
        let repo = WalletRepository::new(&db);
        let mut low = new_wallet(EVM_ADDRESS);
        low.risk_score = 10;
        repo.create(&ctx(), low).unwrap();
        let mut high = new_wallet("0x000000000000000000000000000000000000dEaD");
        high.risk_score = 95;
        repo.create(&ctx(), high).unwrap();

        let page = repo.list(&WalletFilter::default(), Pagination::default()).unwrap();
        assert_eq!(page.items[0].risk_score, 95);

        let filter = WalletFilter {
            risk_level: Some(RiskLevel::Low),
            ..Default::default()
        };
        assert_eq!(repo.list(&filter, Pagination::default()).unwrap().total, 1);
    }
}
