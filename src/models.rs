// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Shared Domain Models
//!
//! Types used across several entities: the department (LEA) tags, supported
//! blockchains with their address rules, the state catalogue used by the
//! fraud statistics, and small validation helpers shared by request types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Departments
// =============================================================================

/// Law enforcement agency / department tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    CyberCrimeCell,
    StatePolice,
    Cbi,
    EnforcementDirectorate,
    FiuInd,
    Nia,
    IncomeTax,
}

impl Department {
    pub const ALL: [Department; 7] = [
        Department::CyberCrimeCell,
        Department::StatePolice,
        Department::Cbi,
        Department::EnforcementDirectorate,
        Department::FiuInd,
        Department::Nia,
        Department::IncomeTax,
    ];

    /// Wire tag (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::CyberCrimeCell => "cyber_crime_cell",
            Department::StatePolice => "state_police",
            Department::Cbi => "cbi",
            Department::EnforcementDirectorate => "enforcement_directorate",
            Department::FiuInd => "fiu_ind",
            Department::Nia => "nia",
            Department::IncomeTax => "income_tax",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Department::CyberCrimeCell => "Cyber Crime Cell",
            Department::StatePolice => "State Police",
            Department::Cbi => "Central Bureau of Investigation",
            Department::EnforcementDirectorate => "Enforcement Directorate",
            Department::FiuInd => "Financial Intelligence Unit",
            Department::Nia => "National Investigation Agency",
            Department::IncomeTax => "Income Tax Department",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Department::CyberCrimeCell => "First point of contact for online fraud complaints",
            Department::StatePolice => "State-level investigation and FIR registration",
            Department::Cbi => "Inter-state and high-value fraud investigations",
            Department::EnforcementDirectorate => "Money laundering and asset attachment",
            Department::FiuInd => "Receives and analyses suspicious transaction reports",
            Department::Nia => "Terror financing and national security cases",
            Department::IncomeTax => "Tax evasion linked to virtual digital assets",
        }
    }
}

impl std::fmt::Display for Department {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Blockchains
// =============================================================================

/// Chains the watchlist understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Blockchain {
    Bitcoin,
    Ethereum,
    Tron,
    BinanceSmartChain,
    Polygon,
    Solana,
    Other,
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

impl Blockchain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Blockchain::Bitcoin => "bitcoin",
            Blockchain::Ethereum => "ethereum",
            Blockchain::Tron => "tron",
            Blockchain::BinanceSmartChain => "binance_smart_chain",
            Blockchain::Polygon => "polygon",
            Blockchain::Solana => "solana",
            Blockchain::Other => "other",
        }
    }

    /// EVM chains share the `0x` + 40 hex address format.
    pub fn is_evm(&self) -> bool {
        matches!(
            self,
            Blockchain::Ethereum | Blockchain::BinanceSmartChain | Blockchain::Polygon
        )
    }

    /// Validate an address for this chain and return its canonical form.
    ///
    /// EVM addresses are lowercased; bech32 Bitcoin addresses are lowercased;
    /// base58 formats are case-sensitive and kept as given.
    pub fn normalize_address(&self, raw: &str) -> Result<String, String> {
        let address = raw.trim();
        if address.is_empty() {
            return Err("address must not be empty".to_string());
        }

        match self {
            chain if chain.is_evm() => {
                if !address.starts_with("0x") && !address.starts_with("0X") {
                    return Err("address must start with 0x".to_string());
                }
                if address.len() != 42 {
                    return Err("address must be 42 characters (0x + 40 hex)".to_string());
                }
                if !address[2..].chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err("address must contain only hex characters".to_string());
                }
                Ok(address.to_ascii_lowercase())
            }
            Blockchain::Bitcoin => {
                let lower = address.to_ascii_lowercase();
                if lower.starts_with("bc1") {
                    if !(14..=74).contains(&lower.len())
                        || !lower[3..].chars().all(|c| BECH32_CHARSET.contains(c))
                    {
                        return Err("invalid bech32 bitcoin address".to_string());
                    }
                    return Ok(lower);
                }
                if !(address.starts_with('1') || address.starts_with('3'))
                    || !(26..=35).contains(&address.len())
                    || !is_base58(address)
                {
                    return Err("invalid base58 bitcoin address".to_string());
                }
                Ok(address.to_string())
            }
            Blockchain::Tron => {
                if !address.starts_with('T') || address.len() != 34 || !is_base58(address) {
                    return Err("tron address must be 34 base58 characters starting with T".to_string());
                }
                Ok(address.to_string())
            }
            Blockchain::Solana => {
                if !(32..=44).contains(&address.len()) || !is_base58(address) {
                    return Err("solana address must be 32-44 base58 characters".to_string());
                }
                Ok(address.to_string())
            }
            _ => {
                if address.len() > 128 || address.chars().any(char::is_whitespace) {
                    return Err("address must be at most 128 characters without spaces".to_string());
                }
                Ok(address.to_string())
            }
        }
    }
}

impl Blockchain {
    /// Ticker of the chain's native asset, `None` for `Other`.
    pub fn native_currency(&self) -> Option<&'static str> {
        match self {
            Blockchain::Bitcoin => Some("BTC"),
            Blockchain::Ethereum => Some("ETH"),
            Blockchain::Tron => Some("TRX"),
            Blockchain::BinanceSmartChain => Some("BNB"),
            Blockchain::Polygon => Some("POL"),
            Blockchain::Solana => Some("SOL"),
            Blockchain::Other => None,
        }
    }

    /// Validate a transaction hash and return its canonical form.
    pub fn normalize_tx_hash(&self, raw: &str) -> Result<String, String> {
        let hash = raw.trim();
        let hex64 = |h: &str| h.len() == 64 && h.chars().all(|c| c.is_ascii_hexdigit());
        match self {
            chain if chain.is_evm() => {
                let body = hash.strip_prefix("0x").unwrap_or(hash);
                if !hex64(body) {
                    return Err("transaction hash must be 0x + 64 hex characters".to_string());
                }
                Ok(format!("0x{}", body.to_ascii_lowercase()))
            }
            Blockchain::Bitcoin | Blockchain::Tron => {
                if !hex64(hash) {
                    return Err("transaction hash must be 64 hex characters".to_string());
                }
                Ok(hash.to_ascii_lowercase())
            }
            Blockchain::Solana => {
                if !(64..=88).contains(&hash.len()) || !is_base58(hash) {
                    return Err("solana signature must be 64-88 base58 characters".to_string());
                }
                Ok(hash.to_string())
            }
            _ => {
                if hash.is_empty() || hash.len() > 128 || hash.chars().any(char::is_whitespace) {
                    return Err("transaction hash must be 1-128 characters without spaces".to_string());
                }
                Ok(hash.to_string())
            }
        }
    }
}

fn is_base58(s: &str) -> bool {
    s.chars().all(|c| BASE58_ALPHABET.contains(c))
}

impl std::fmt::Display for Blockchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Complainant
// =============================================================================

/// Person who reported the fraud.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Complainant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Complainant {
    pub fn validate(&self) -> Result<(), String> {
        require_text("complainant.name", &self.name, 200)?;
        if let Some(phone) = &self.phone {
            let digits = phone.chars().filter(char::is_ascii_digit).count();
            if !(7..=15).contains(&digits)
                || !phone
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
            {
                return Err("complainant.phone is not a valid phone number".to_string());
            }
        }
        if let Some(email) = &self.email {
            validate_email("complainant.email", email)?;
        }
        Ok(())
    }
}

// =============================================================================
// States
// =============================================================================

/// States and union territories: (code, name).
pub const STATES: [(&str, &str); 36] = [
    ("AN", "Andaman and Nicobar Islands"),
    ("AP", "Andhra Pradesh"),
    ("AR", "Arunachal Pradesh"),
    ("AS", "Assam"),
    ("BR", "Bihar"),
    ("CH", "Chandigarh"),
    ("CT", "Chhattisgarh"),
    ("DN", "Dadra and Nagar Haveli and Daman and Diu"),
    ("DL", "Delhi"),
    ("GA", "Goa"),
    ("GJ", "Gujarat"),
    ("HR", "Haryana"),
    ("HP", "Himachal Pradesh"),
    ("JK", "Jammu and Kashmir"),
    ("JH", "Jharkhand"),
    ("KA", "Karnataka"),
    ("KL", "Kerala"),
    ("LA", "Ladakh"),
    ("LD", "Lakshadweep"),
    ("MP", "Madhya Pradesh"),
    ("MH", "Maharashtra"),
    ("MN", "Manipur"),
    ("ML", "Meghalaya"),
    ("MZ", "Mizoram"),
    ("NL", "Nagaland"),
    ("OR", "Odisha"),
    ("PY", "Puducherry"),
    ("PB", "Punjab"),
    ("RJ", "Rajasthan"),
    ("SK", "Sikkim"),
    ("TN", "Tamil Nadu"),
    ("TG", "Telangana"),
    ("TR", "Tripura"),
    ("UP", "Uttar Pradesh"),
    ("UT", "Uttarakhand"),
    ("WB", "West Bengal"),
];

/// Resolve a state code (case-insensitive) to `(CODE, name)`.
pub fn lookup_state(code: &str) -> Option<(&'static str, &'static str)> {
    let code = code.trim();
    STATES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .copied()
}

// =============================================================================
// Validation Helpers
// =============================================================================

/// Non-blank text no longer than `max` characters.
pub fn require_text(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if value.chars().count() > max {
        return Err(format!("{field} must be at most {max} characters"));
    }
    Ok(())
}

/// Optional text no longer than `max` characters.
pub fn limit_text(field: &str, value: Option<&str>, max: usize) -> Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => Err(format!("{field} must be at most {max} characters")),
        _ => Ok(()),
    }
}

/// Finite, non-negative amount.
pub fn validate_amount(field: &str, amount: f64) -> Result<(), String> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(format!("{field} must be a non-negative number"));
    }
    Ok(())
}

/// ISO-4217-like currency or ticker code (2-10 uppercase alphanumerics).
pub fn normalize_currency(code: &str) -> Result<String, String> {
    let code = code.trim().to_ascii_uppercase();
    if !(2..=10).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("currency must be 2-10 alphanumeric characters".to_string());
    }
    Ok(code)
}

pub fn validate_email(field: &str, email: &str) -> Result<(), String> {
    let valid = email.len() <= 254
        && email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        })
        && !email.chars().any(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(format!("{field} is not a valid email address"))
    }
}
