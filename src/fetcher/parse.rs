//! Upstream output parsing
//!
//! The scripts print diagnostics before the result; only the last
//! non-empty stdout line is authoritative. Every field is read on its own
//! with its own default so one malformed value never sinks the payload.

use serde_json::Value;

use super::FetchError;
use crate::data::{
    AccountHandle, DecorationColors, GiftRecord, MAX_GIFTS, ProfileInfo, ProfilePayload,
    now_millis,
};
use crate::decoration::{color_from_value, derived_edge};

/// Last non-empty line of `stdout`, trimmed
pub fn last_line(stdout: &str) -> Option<&str> {
    stdout.lines().map(str::trim).rfind(|line| !line.is_empty())
}

/// Parse the authoritative line as JSON
///
/// Empty output parses as `{}`, which then fails the success check.
pub fn parse_last_line(stdout: &str) -> Result<Value, FetchError> {
    let line = last_line(stdout).unwrap_or("{}");
    serde_json::from_str(line).map_err(|e| FetchError::Parse(e.to_string()))
}

/// Fail with the upstream message unless `success` is true
pub fn ensure_success(value: &Value, default_message: &str) -> Result<(), FetchError> {
    if value.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }

    let message = read_string(value, "error").unwrap_or_else(|| default_message.to_string());
    Err(FetchError::Upstream(message))
}

/// Map a successful gift listing into a payload
pub fn map_payload(value: &Value, handle: &AccountHandle) -> ProfilePayload {
    let raw_gifts: Vec<&Value> = value
        .get("gifts")
        .and_then(Value::as_array)
        .map(|gifts| gifts.iter().filter(|gift| gift.is_object()).collect())
        .unwrap_or_default();

    let gifts: Vec<GiftRecord> = raw_gifts
        .iter()
        .take(MAX_GIFTS)
        .map(|gift| map_gift(gift))
        .collect();

    let upgraded = raw_gifts
        .iter()
        .filter(|gift| read_truthy(gift, "is_upgraded"))
        .count();

    let profile = map_profile(value.get("user").filter(|user| user.is_object()), handle);

    ProfilePayload {
        gifts,
        decoration_colors: profile.decoration_colors.clone(),
        profile,
        total: read_u64(value, "total").unwrap_or(raw_gifts.len() as u64),
        nft_count: read_u64(value, "nft_count").unwrap_or(upgraded as u64),
        total_value: read_f64(value, "total_value").unwrap_or(0.0),
        fetched_at: now_millis(),
    }
}

/// Identity falls back number -> gift id -> slug -> fresh ULID
fn map_gift(gift: &Value) -> GiftRecord {
    let number = read_i64(gift, "num");
    let external_id = read_i64(gift, "gift_id");
    let slug = read_string(gift, "slug");

    let id = number
        .map(|n| n.to_string())
        .or_else(|| external_id.map(|n| n.to_string()))
        .or_else(|| slug.clone())
        .unwrap_or_else(|| ulid::Ulid::new().to_string());

    GiftRecord {
        id,
        slug,
        number,
        external_id,
        is_upgraded: read_truthy(gift, "is_upgraded"),
        price: read_f64(gift, "price"),
        preview_url: read_string(gift, "fragment_url"),
        external_link: read_string(gift, "fragment_link"),
    }
}

fn map_profile(user: Option<&Value>, handle: &AccountHandle) -> ProfileInfo {
    let Some(user) = user else {
        return ProfileInfo {
            id: None,
            username: handle.to_string(),
            display_name: handle.to_string(),
            photo_data_url: None,
            decoration_colors: None,
        };
    };

    let username = read_string(user, "username").unwrap_or_else(|| handle.to_string());
    let display_name = read_string(user, "display_name").unwrap_or_else(|| username.clone());

    ProfileInfo {
        id: read_i64(user, "id"),
        username,
        display_name,
        photo_data_url: read_string(user, "photo_data_url"),
        decoration_colors: user.get("decoration_colors").and_then(map_reported_colors),
    }
}

/// Colors reported alongside the gift listing; present only with a center
fn map_reported_colors(colors: &Value) -> Option<DecorationColors> {
    let center_color = colors.get("center_color").and_then(color_from_value)?;
    let edge_color = colors
        .get("edge_color")
        .and_then(color_from_value)
        .unwrap_or_else(|| derived_edge(&center_color));

    Some(DecorationColors {
        center_color,
        edge_color,
        pattern_color: colors.get("pattern_color").and_then(color_from_value),
        text_color: colors.get("text_color").and_then(color_from_value),
    })
}

// =============================================================================
// Field readers
// =============================================================================

fn read_string(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn read_i64(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_u64(value: &Value, key: &str) -> Option<u64> {
    read_i64(value, key).and_then(|n| u64::try_from(n).ok())
}

fn read_f64(value: &Value, key: &str) -> Option<f64> {
    let number = match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|f| f.is_finite())
}

/// Loose truthiness: non-zero numbers and non-empty strings count
fn read_truthy(value: &Value, key: &str) -> bool {
    match value.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}
