// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the portal database.
//!
//! Each repository provides list/get/create/update for one entity type.
//! Cross-entity invariants (foreign keys, unique numbers, audit rows) are
//! checked inside the same redb write transaction as the mutation.

pub mod cases;
pub mod exports;
pub mod kyc;
pub mod ledger;
pub mod news;
pub mod nodes;
pub mod patterns;
pub mod state_stats;
pub mod strs;
pub mod timeline;
pub mod transactions;
pub mod users;
pub mod wallets;

pub use cases::{Case, CaseFilter, CasePatch, CasePriority, CaseRepository, CaseStatus, FraudType, NewCase};
pub use exports::{CourtExport, ExportFormat, ExportRepository, ExportSummary};
pub use kyc::{KycRecord, KycRepository, NewKycRecord};
pub use ledger::{LedgerFilter, LedgerRepository};
pub use news::{NewNewsItem, NewsFilter, NewsItem, NewsRepository};
pub use nodes::{NewNode, NodeFilter, NodePatch, NodeRepository};
pub use patterns::{
    DetectionOutcome, NewPattern, PatternFilter, PatternPatch, PatternRepository, PatternStatus,
    PatternType, Severity, SuspiciousPattern,
};
pub use state_stats::{NationalTotals, StateFraudStats, StateStatsRepository, StatsBaseline, StatsFilter};
pub use strs::{NewStrReport, StrFilter, StrPatch, StrReport, StrRepository, StrStatus};
pub use timeline::{NewTimelineEvent, TimelineEvent, TimelineEventType, TimelineFilter, TimelineRepository};
pub use transactions::{NewTransaction, TracedTransaction, TransactionFilter, TransactionPatch, TransactionRepository};
pub use users::{NewUser, User, UserFilter, UserPatch, UserRepository, UserResponse};
pub use wallets::{NewWallet, RiskLevel, WalletFilter, WalletPatch, WalletRepository, WalletStatus, WatchedWallet};
