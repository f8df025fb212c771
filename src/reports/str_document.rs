// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Plain-text Suspicious Transaction Report.
//!
//! The document is assembled from the stored STR, its case, the linked
//! wallet (with KYC details, document numbers masked) and the listed
//! transactions. Rendering is read-only.

use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{money, tag};
use crate::storage::repository::kyc::mask_document_number;
use crate::storage::{
    Case, CaseRepository, Database, KycRecord, KycRepository, StorageResult, StrReport,
    StrRepository, TracedTransaction, TransactionRepository, WalletRepository, WatchedWallet,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StrDocument {
    pub str_id: String,
    pub str_number: String,
    pub generated_at: DateTime<Utc>,
    pub content: String,
}

/// Load everything the report references and render it.
pub fn render_str_document(db: &Database, str_id: &str) -> StorageResult<StrDocument> {
    let report = StrRepository::new(db).get(str_id)?;
    let case = CaseRepository::new(db).get(&report.case_id)?;

    let (wallet, kyc) = match &report.wallet_id {
        Some(wallet_id) => {
            let wallet = WalletRepository::new(db).get(wallet_id)?;
            let kyc = KycRepository::new(db).for_wallet(wallet_id)?;
            (Some(wallet), kyc)
        }
        None => (None, Vec::new()),
    };

    let tx_repo = TransactionRepository::new(db);
    let transactions = report
        .transaction_ids
        .iter()
        .map(|id| tx_repo.get(id))
        .collect::<StorageResult<Vec<_>>>()?;

    let generated_at = Utc::now();
    let content = compose(&report, &case, wallet.as_ref(), &kyc, &transactions, generated_at);
    Ok(StrDocument {
        str_id: report.id,
        str_number: report.str_number,
        generated_at,
        content,
    })
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn compose(
    report: &StrReport,
    case: &Case,
    wallet: Option<&WatchedWallet>,
    kyc: &[KycRecord],
    transactions: &[TracedTransaction],
    generated_at: DateTime<Utc>,
) -> String {
    // Writing into a String cannot fail.
    let mut out = String::new();
    let rule = "=".repeat(72);

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "SUSPICIOUS TRANSACTION REPORT  {}", report.str_number);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Status:        {}", report.status.as_str());
    let _ = writeln!(out, "Generated:     {}", timestamp(&generated_at));
    if let Some(at) = &report.submitted_at {
        let _ = writeln!(out, "Submitted:     {}", timestamp(at));
    }
    if let Some(at) = &report.filed_at {
        let _ = writeln!(out, "Filed:         {}", timestamp(at));
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "1. CASE REFERENCE");
    let _ = writeln!(out, "   Case number: {}", case.case_number);
    let _ = writeln!(out, "   Title:       {}", case.title);
    let _ = writeln!(out, "   Fraud type:  {}", tag(&case.fraud_type));
    let _ = writeln!(out, "   Department:  {}", case.department.display_name());
    let _ = writeln!(out, "   State:       {}", case.state_code);
    let _ = writeln!(out, "   Amount lost: {}", money(case.amount_lost, &case.currency));
    let _ = writeln!(out);

    let _ = writeln!(out, "2. SUBJECT");
    let _ = writeln!(out, "   Name: {}", report.subject_name);
    match wallet {
        Some(w) => {
            let _ = writeln!(out, "   Wallet:     {} ({})", w.address, w.blockchain);
            if let Some(label) = &w.label {
                let _ = writeln!(out, "   Label:      {label}");
            }
            let _ = writeln!(
                out,
                "   Risk:       {} ({}/100), status {}",
                tag(&w.risk_level),
                w.risk_score,
                tag(&w.status)
            );
        }
        None => {
            let _ = writeln!(out, "   Wallet: not linked");
        }
    }
    for record in kyc {
        let _ = writeln!(
            out,
            "   KYC ({}): {}, {} {}{}",
            record.exchange,
            record.holder_name,
            tag(&record.id_document_type),
            mask_document_number(&record.id_document_number),
            if record.verified { ", verified" } else { "" }
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "3. SUMMARY");
    let _ = writeln!(out, "{}", indent(&report.summary));
    let _ = writeln!(out);
    let _ = writeln!(out, "4. GROUNDS FOR SUSPICION");
    let _ = writeln!(out, "{}", indent(&report.grounds_for_suspicion));
    let _ = writeln!(out);

    let _ = writeln!(out, "5. TRANSACTIONS ({})", transactions.len());
    if transactions.is_empty() {
        let _ = writeln!(out, "   none listed");
    }
    for (n, tx) in transactions.iter().enumerate() {
        let _ = writeln!(
            out,
            "   {:>3}. {} {} -> {} {}",
            n + 1,
            timestamp(&tx.occurred_at),
            tx.from_address,
            tx.to_address,
            money(tx.amount, &tx.currency)
        );
        let _ = writeln!(out, "        {} {}", tx.blockchain, tx.tx_hash);
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "TOTAL REPORTED: {}",
        money(report.total_amount, &report.currency)
    );

    if let Some(notes) = &report.reviewer_notes {
        let _ = writeln!(out);
        let _ = writeln!(out, "REVIEWER NOTES");
        let _ = writeln!(out, "{}", indent(notes));
    }
    let _ = writeln!(out, "{rule}");
    out
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("   {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::cases::tests::{ctx, new_case};
    use crate::storage::repository::kyc::{IdDocumentType, KycSource};
    use crate::storage::repository::strs::tests::new_str;
    use crate::storage::repository::transactions::tests::{evm, new_tx};
    use crate::storage::repository::wallets::tests::{new_wallet, EVM_ADDRESS};
    use crate::storage::{NewKycRecord, StorageError};

    #[test]
    fn document_includes_case_wallet_and_masked_kyc() {
        let db = Database::in_memory().unwrap();
        let case = CaseRepository::new(&db).create(&ctx(), new_case("Pig butchering")).unwrap().record;
        let wallet = WalletRepository::new(&db)
            .create(&ctx(), new_wallet(EVM_ADDRESS))
            .unwrap()
            .record;
        KycRepository::new(&db)
            .create(
                &ctx(),
                &wallet.id,
                NewKycRecord {
                    exchange: "WazirX".into(),
                    holder_name: "R. Kumar".into(),
                    id_document_type: IdDocumentType::Pan,
                    id_document_number: "ABCDE1234F".into(),
                    nationality: None,
                    phone: None,
                    email: None,
                    verified: true,
                    source: KycSource::ExchangeResponse,
                },
            )
            .unwrap();
        let tx = TransactionRepository::new(&db)
            .create(&ctx(), new_tx(&case.id, 1, &evm(1), &evm(2), 4200.0, Utc::now()))
            .unwrap();

        let mut new = new_str(&case.id);
        new.wallet_id = Some(wallet.id.clone());
        new.transaction_ids = vec![tx.id.clone()];
        let report = StrRepository::new(&db).create(&ctx(), new).unwrap().record;

        let doc = render_str_document(&db, &report.id).unwrap();
        assert_eq!(doc.str_number, report.str_number);
        assert!(doc.content.contains(&case.case_number));
        assert!(doc.content.contains(&wallet.address));
        assert!(doc.content.contains("******234F"));
        assert!(!doc.content.contains("ABCDE1234F"));
        assert!(doc.content.contains(&tx.tx_hash));
        assert!(doc.content.contains("TRANSACTIONS (1)"));
    }

    #[test]
    fn missing_report_is_not_found() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(
            render_str_document(&db, "missing"),
            Err(StorageError::NotFound(_))
        ));
    }
}
