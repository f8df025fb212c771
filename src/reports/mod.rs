// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Documents generated from case data: rendered STRs and court evidence
//! bundles.

pub mod court_export;
pub mod str_document;

pub use court_export::{assemble_bundle, generate_export, render_bundle, EvidenceBundle};
pub use str_document::{render_str_document, StrDocument};

use serde::Serialize;

/// Wire name of a serde enum (`snake_case` tag), for plain-text output.
pub(crate) fn tag<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => String::from("unknown"),
    }
}

/// Render an amount with two decimals and its currency code.
pub(crate) fn money(amount: f64, currency: &str) -> String {
    format!("{amount:.2} {currency}")
}
