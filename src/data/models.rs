//! Data models
//!
//! Rust structs representing cached payloads and their parts.
//! Wire names are camelCase to match the HTTP contract.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Maximum number of gift records kept per payload
pub const MAX_GIFTS: usize = 60;

/// Longest accepted account handle (after normalization)
const MAX_HANDLE_LEN: usize = 64;

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Current wall-clock time as a [`Timestamp`]
pub fn now_millis() -> Timestamp {
    Utc::now().timestamp_millis()
}

// =============================================================================
// Account Handle
// =============================================================================

/// Normalized account identifier, the sole cache key
///
/// Always lower-cased with leading `@` sigils stripped.
///
/// Example: `"@Alice"` -> `"alice"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountHandle(String);

impl AccountHandle {
    /// Normalize and validate a raw handle
    ///
    /// # Errors
    /// Returns `AppError::Validation` if the handle is empty, too long, or
    /// contains anything other than ASCII letters, digits and underscores.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let normalized = raw.trim().trim_start_matches('@').to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(AppError::Validation("username cannot be empty".to_string()));
        }

        if normalized.len() > MAX_HANDLE_LEN {
            return Err(AppError::Validation(format!(
                "username must be at most {} characters",
                MAX_HANDLE_LEN
            )));
        }

        if !normalized.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AppError::Validation(
                "username may only contain letters, digits and underscores".to_string(),
            ));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Handle with the `@` sigil re-attached, as the gift script expects
    pub fn with_sigil(&self) -> String {
        format!("@{}", self.0)
    }
}

impl fmt::Display for AccountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Colors
// =============================================================================

/// RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Subtract `amount` from every channel, saturating at 0
    pub const fn darken(self, amount: u8) -> Self {
        Self {
            r: self.r.saturating_sub(amount),
            g: self.g.saturating_sub(amount),
            b: self.b.saturating_sub(amount),
        }
    }
}

/// A color as reported upstream: a structured triple or a string encoding
/// (e.g. `"#3b82f6"` or `"rgb(59, 130, 246)"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Rgb(Rgb),
    Text(String),
}

impl ColorValue {
    pub fn as_rgb(&self) -> Option<Rgb> {
        match self {
            Self::Rgb(rgb) => Some(*rgb),
            Self::Text(_) => None,
        }
    }
}

/// Two-color accent pair with optional extras from the worn decoration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationColors {
    pub center_color: ColorValue,
    pub edge_color: ColorValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_color: Option<ColorValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<ColorValue>,
}

// =============================================================================
// Profile Payload
// =============================================================================

/// A single collectible in an account's inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftRecord {
    /// number -> externalId -> slug -> generated ULID
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default)]
    pub external_id: Option<i64>,
    #[serde(default)]
    pub is_upgraded: bool,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub external_link: Option<String>,
}

/// Public profile of the inventory owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInfo {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub photo_data_url: Option<String>,
    #[serde(default)]
    pub decoration_colors: Option<DecorationColors>,
}

/// Normalized result of one fetch, as stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePayload {
    pub gifts: Vec<GiftRecord>,
    pub profile: ProfileInfo,
    pub total: u64,
    pub nft_count: u64,
    pub total_value: f64,
    #[serde(default)]
    pub decoration_colors: Option<DecorationColors>,
    pub fetched_at: Timestamp,
}

/// Cached payload with the time it was written
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: AccountHandle,
    pub payload: ProfilePayload,
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_strips_sigil_and_lowercases() {
        let handle = AccountHandle::parse("  @@Alice_01 ").unwrap();
        assert_eq!(handle.as_str(), "alice_01");
        assert_eq!(handle.with_sigil(), "@alice_01");
    }

    #[test]
    fn handle_rejects_empty_and_bad_characters() {
        assert!(matches!(
            AccountHandle::parse("@"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            AccountHandle::parse("--include-user"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            AccountHandle::parse(&"a".repeat(65)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn darken_saturates_at_zero() {
        assert_eq!(Rgb::new(59, 130, 20).darken(30), Rgb::new(29, 100, 0));
    }

    #[test]
    fn color_value_serializes_untagged() {
        let rgb = serde_json::to_value(ColorValue::Rgb(Rgb::new(1, 2, 3))).unwrap();
        assert_eq!(rgb, serde_json::json!({ "r": 1, "g": 2, "b": 3 }));

        let text: ColorValue = serde_json::from_value(serde_json::json!("#112233")).unwrap();
        assert_eq!(text, ColorValue::Text("#112233".to_string()));
    }
}
