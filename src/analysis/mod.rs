// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Pattern Detection
//!
//! Rule-based detectors run over the traced transactions of one case.
//! Detectors are pure functions; persistence and flagging happen in
//! [`PatternRepository::record_detections`](crate::storage::PatternRepository::record_detections).
//!
//! | Detector | Shape | Severity |
//! |----------|-------|----------|
//! | structuring | >= 3 transfers from one address, each 90-100% of the threshold, within 24 h | high |
//! | rapid movement | address forwards >= 90% of a receipt within 1 h | high |
//! | fan-out | one address pays >= 5 distinct recipients within 24 h | medium |
//! | round amounts | >= 3 transfers from one address in exact multiples of 1,000 | low |
//!
//! Amounts are compared in the transaction's own units; currencies are not
//! converted.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::repository::{PatternType, Severity, TracedTransaction};

/// Tunables for the detectors.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Reporting threshold structuring tries to stay under.
    pub reporting_threshold: f64,
    /// Lower bound of the structuring band as a fraction of the threshold.
    pub structuring_band: f64,
    pub structuring_min_count: usize,
    pub structuring_window: Duration,
    pub rapid_window: Duration,
    /// Share of a receipt that must leave again to count as pass-through.
    pub rapid_ratio: f64,
    pub fan_out_min_recipients: usize,
    pub fan_out_window: Duration,
    pub round_unit: f64,
    pub round_min_count: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            reporting_threshold: 10_000.0,
            structuring_band: 0.9,
            structuring_min_count: 3,
            structuring_window: Duration::hours(24),
            rapid_window: Duration::hours(1),
            rapid_ratio: 0.9,
            fan_out_min_recipients: 5,
            fan_out_window: Duration::hours(24),
            round_unit: 1_000.0,
            round_min_count: 3,
        }
    }
}

/// A pattern found by a detector, not yet persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DetectedPattern {
    pub pattern_type: PatternType,
    pub severity: Severity,
    pub confidence: f64,
    pub description: String,
    pub addresses: Vec<String>,
    pub transaction_ids: Vec<String>,
}

/// Run every detector. Output order is deterministic.
pub fn detect_patterns(transactions: &[TracedTransaction], config: &DetectionConfig) -> Vec<DetectedPattern> {
    let mut sorted: Vec<&TracedTransaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then_with(|| a.id.cmp(&b.id)));

    let mut found = Vec::new();
    found.extend(detect_structuring(&sorted, config));
    found.extend(detect_rapid_movement(&sorted, config));
    found.extend(detect_fan_out(&sorted, config));
    found.extend(detect_round_amounts(&sorted, config));

    tracing::debug!(
        transactions = transactions.len(),
        patterns = found.len(),
        "Pattern detection finished"
    );
    found
}

/// Group time-ordered transactions by sender.
fn by_sender<'a>(sorted: &[&'a TracedTransaction]) -> BTreeMap<&'a str, Vec<&'a TracedTransaction>> {
    let mut groups: BTreeMap<&str, Vec<&TracedTransaction>> = BTreeMap::new();
    for tx in sorted {
        groups.entry(tx.from_address.as_str()).or_default().push(tx);
    }
    groups
}

/// Largest run of `txs` (time-ordered) that fits inside `window`, by a
/// caller-supplied size measure. Returns the slice bounds.
fn densest_window<F>(txs: &[&TracedTransaction], window: Duration, size: F) -> Option<(usize, usize, usize)>
where
    F: Fn(&[&TracedTransaction]) -> usize,
{
    let mut best: Option<(usize, usize, usize)> = None;
    let mut end = 0;
    for start in 0..txs.len() {
        if end < start {
            end = start;
        }
        while end + 1 < txs.len() && txs[end + 1].occurred_at - txs[start].occurred_at <= window {
            end += 1;
        }
        let n = size(&txs[start..=end]);
        if best.is_none_or(|(_, _, b)| n > b) {
            best = Some((start, end, n));
        }
    }
    best
}

fn ids(txs: &[&TracedTransaction]) -> Vec<String> {
    txs.iter().map(|t| t.id.clone()).collect()
}

fn total(txs: &[&TracedTransaction]) -> f64 {
    txs.iter().map(|t| t.amount).sum()
}

pub fn detect_structuring(sorted: &[&TracedTransaction], config: &DetectionConfig) -> Vec<DetectedPattern> {
    let low = config.reporting_threshold * config.structuring_band;
    let high = config.reporting_threshold;
    let mut found = Vec::new();

    for (sender, txs) in by_sender(sorted) {
        let in_band: Vec<&TracedTransaction> = txs
            .into_iter()
            .filter(|t| t.amount >= low && t.amount < high)
            .collect();
        let Some((start, end, count)) =
            densest_window(&in_band, config.structuring_window, |w| w.len())
        else {
            continue;
        };
        if count < config.structuring_min_count {
            continue;
        }
        let cluster = &in_band[start..=end];
        let extra = (count - config.structuring_min_count) as f64;
        found.push(DetectedPattern {
            pattern_type: PatternType::Structuring,
            severity: Severity::High,
            confidence: (0.7 + 0.05 * extra).min(0.95),
            description: format!(
                "{count} transfers from {sender} between {low:.0} and {high:.0} within {} hours (total {:.2})",
                config.structuring_window.num_hours(),
                total(cluster)
            ),
            addresses: vec![sender.to_string()],
            transaction_ids: ids(cluster),
        });
    }
    found
}

pub fn detect_rapid_movement(sorted: &[&TracedTransaction], config: &DetectionConfig) -> Vec<DetectedPattern> {
    let mut found = Vec::new();
    let addresses: BTreeSet<&str> = sorted.iter().map(|t| t.to_address.as_str()).collect();

    for address in addresses {
        let mut involved: BTreeSet<&str> = BTreeSet::new();
        let mut best_ratio: f64 = 0.0;
        let mut moved = 0.0;

        for incoming in sorted.iter().filter(|t| t.to_address == address) {
            if incoming.amount <= 0.0 {
                continue;
            }
            let outgoing: Vec<&&TracedTransaction> = sorted
                .iter()
                .filter(|t| {
                    t.from_address == address
                        && t.id != incoming.id
                        && t.occurred_at >= incoming.occurred_at
                        && t.occurred_at - incoming.occurred_at <= config.rapid_window
                })
                .collect();
            let out_sum: f64 = outgoing.iter().map(|t| t.amount).sum();
            let ratio = out_sum / incoming.amount;
            if ratio >= config.rapid_ratio {
                involved.insert(incoming.id.as_str());
                involved.extend(outgoing.iter().map(|t| t.id.as_str()));
                best_ratio = best_ratio.max(ratio);
                moved += out_sum;
            }
        }

        if involved.is_empty() {
            continue;
        }
        // Keep chronological order in the output.
        let transaction_ids: Vec<String> = sorted
            .iter()
            .filter(|t| involved.contains(t.id.as_str()))
            .map(|t| t.id.clone())
            .collect();
        found.push(DetectedPattern {
            pattern_type: PatternType::RapidMovement,
            severity: Severity::High,
            confidence: (0.6 + 0.3 * best_ratio.min(1.0)).min(0.9),
            description: format!(
                "{address} forwarded {:.0}% of received funds within {} minutes ({moved:.2} moved)",
                best_ratio.min(1.0) * 100.0,
                config.rapid_window.num_minutes()
            ),
            addresses: vec![address.to_string()],
            transaction_ids,
        });
    }
    found
}

pub fn detect_fan_out(sorted: &[&TracedTransaction], config: &DetectionConfig) -> Vec<DetectedPattern> {
    let mut found = Vec::new();

    for (sender, txs) in by_sender(sorted) {
        let distinct = |w: &[&TracedTransaction]| {
            w.iter()
                .map(|t| t.to_address.as_str())
                .collect::<BTreeSet<_>>()
                .len()
        };
        let Some((start, end, recipients)) = densest_window(&txs, config.fan_out_window, distinct)
        else {
            continue;
        };
        if recipients < config.fan_out_min_recipients {
            continue;
        }
        let cluster = &txs[start..=end];
        let mut addresses = vec![sender.to_string()];
        addresses.extend(
            cluster
                .iter()
                .map(|t| t.to_address.clone())
                .collect::<BTreeSet<_>>(),
        );
        let extra = (recipients - config.fan_out_min_recipients) as f64;
        found.push(DetectedPattern {
            pattern_type: PatternType::FanOut,
            severity: Severity::Medium,
            confidence: (0.5 + 0.05 * extra).min(0.85),
            description: format!(
                "{sender} paid {recipients} distinct recipients within {} hours",
                config.fan_out_window.num_hours()
            ),
            addresses,
            transaction_ids: ids(cluster),
        });
    }
    found
}

pub fn detect_round_amounts(sorted: &[&TracedTransaction], config: &DetectionConfig) -> Vec<DetectedPattern> {
    let mut found = Vec::new();

    for (sender, txs) in by_sender(sorted) {
        let round: Vec<&TracedTransaction> = txs
            .into_iter()
            .filter(|t| t.amount >= config.round_unit && (t.amount / config.round_unit).fract() == 0.0)
            .collect();
        if round.len() < config.round_min_count {
            continue;
        }
        found.push(DetectedPattern {
            pattern_type: PatternType::RoundAmounts,
            severity: Severity::Low,
            confidence: 0.4,
            description: format!(
                "{} transfers from {sender} in exact multiples of {:.0} (total {:.2})",
                round.len(),
                config.round_unit,
                total(&round)
            ),
            addresses: vec![sender.to_string()],
            transaction_ids: ids(&round),
        });
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Blockchain;
    use chrono::{DateTime, Utc};

    fn tx(id: &str, from: &str, to: &str, amount: f64, at: DateTime<Utc>) -> TracedTransaction {
        TracedTransaction {
            id: id.to_string(),
            case_id: "case".to_string(),
            tx_hash: format!("hash-{id}"),
            blockchain: Blockchain::Ethereum,
            from_address: from.to_string(),
            to_address: to.to_string(),
            amount,
            currency: "USDT".to_string(),
            occurred_at: at,
            block_number: None,
            is_suspicious: false,
            notes: None,
            created_by: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn kinds(found: &[DetectedPattern]) -> Vec<PatternType> {
        found.iter().map(|p| p.pattern_type).collect()
    }

    #[test]
    fn structuring_fires_on_near_threshold_cluster() {
        let t0 = Utc::now();
        let txs = vec![
            tx("a", "S", "X", 9_100.0, t0),
            tx("b", "S", "Y", 9_500.0, t0 + Duration::hours(3)),
            tx("c", "S", "Z", 9_999.0, t0 + Duration::hours(20)),
            // Outside the 24 h window of the first three
            tx("d", "S", "Z", 9_200.0, t0 + Duration::hours(60)),
        ];
        let found = detect_patterns(&txs, &DetectionConfig::default());
        let structuring: Vec<_> = found
            .iter()
            .filter(|p| p.pattern_type == PatternType::Structuring)
            .collect();
        assert_eq!(structuring.len(), 1);
        assert_eq!(structuring[0].transaction_ids, vec!["a", "b", "c"]);
        assert_eq!(structuring[0].severity, Severity::High);
    }

    #[test]
    fn structuring_ignores_spread_out_or_large_transfers() {
        let t0 = Utc::now();
        let spread = vec![
            tx("a", "S", "X", 9_500.0, t0),
            tx("b", "S", "X", 9_500.0, t0 + Duration::hours(25)),
            tx("c", "S", "X", 9_500.0, t0 + Duration::hours(50)),
        ];
        assert!(!kinds(&detect_patterns(&spread, &DetectionConfig::default()))
            .contains(&PatternType::Structuring));

        let above = vec![
            tx("a", "S", "X", 10_000.0, t0),
            tx("b", "S", "X", 12_000.0, t0),
            tx("c", "S", "X", 8_000.0, t0),
        ];
        assert!(!kinds(&detect_patterns(&above, &DetectionConfig::default()))
            .contains(&PatternType::Structuring));
    }

    #[test]
    fn rapid_movement_detects_pass_through() {
        let t0 = Utc::now();
        let txs = vec![
            tx("in", "V", "M", 5_000.0, t0),
            tx("out1", "M", "A", 3_000.0, t0 + Duration::minutes(10)),
            tx("out2", "M", "B", 1_700.0, t0 + Duration::minutes(40)),
        ];
        let found = detect_rapid_movement(
            &txs.iter().collect::<Vec<_>>(),
            &DetectionConfig::default(),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].addresses, vec!["M"]);
        assert_eq!(found[0].transaction_ids, vec!["in", "out1", "out2"]);
    }

    #[test]
    fn slow_or_partial_forwarding_is_benign() {
        let t0 = Utc::now();
        let slow = vec![
            tx("in", "V", "M", 5_000.0, t0),
            tx("out", "M", "A", 5_000.0, t0 + Duration::hours(3)),
        ];
        assert!(detect_rapid_movement(&slow.iter().collect::<Vec<_>>(), &DetectionConfig::default())
            .is_empty());

        let partial = vec![
            tx("in", "V", "M", 5_000.0, t0),
            tx("out", "M", "A", 1_000.0, t0 + Duration::minutes(5)),
        ];
        assert!(
            detect_rapid_movement(&partial.iter().collect::<Vec<_>>(), &DetectionConfig::default())
                .is_empty()
        );
    }

    #[test]
    fn fan_out_needs_five_distinct_recipients() {
        let t0 = Utc::now();
        let mut txs: Vec<TracedTransaction> = (0..5)
            .map(|i| tx(&format!("t{i}"), "H", &format!("R{i}"), 120.0, t0 + Duration::hours(i)))
            .collect();
        let found = detect_fan_out(&txs.iter().collect::<Vec<_>>(), &DetectionConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Medium);
        assert_eq!(found[0].addresses.len(), 6);

        // Repeat payments to the same four recipients don't count
        txs = (0..8)
            .map(|i| tx(&format!("t{i}"), "H", &format!("R{}", i % 4), 120.0, t0 + Duration::hours(i)))
            .collect();
        assert!(detect_fan_out(&txs.iter().collect::<Vec<_>>(), &DetectionConfig::default()).is_empty());
    }

    #[test]
    fn round_amounts_are_low_severity() {
        let t0 = Utc::now();
        let txs = vec![
            tx("a", "R", "X", 2_000.0, t0),
            tx("b", "R", "X", 5_000.0, t0),
            tx("c", "R", "X", 1_000.0, t0),
            tx("d", "R", "X", 1_500.0, t0),
        ];
        let found = detect_round_amounts(&txs.iter().collect::<Vec<_>>(), &DetectionConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Low);
        assert_eq!(found[0].transaction_ids.len(), 3);
    }

    #[test]
    fn benign_activity_produces_nothing() {
        let t0 = Utc::now();
        let txs = vec![
            tx("a", "A", "B", 123.45, t0),
            tx("b", "C", "D", 67.89, t0 + Duration::hours(2)),
            tx("c", "B", "E", 10.0, t0 + Duration::hours(30)),
        ];
        assert!(detect_patterns(&txs, &DetectionConfig::default()).is_empty());
    }
}
