//! Decoration color resolution
//!
//! Upstream reports the accent colors of a profile in many shapes: a
//! structured object on the worn decoration, a small palette id, an
//! `{r, g, b}` object, an `"rgb(r, g, b)"` string, or an `RGB(...)` token
//! buried in a raw attribute bag. Each color field is resolved by a
//! [`ResolverChain`] whose stage order encodes authority.
//!
//! Resolution is pure: the same input always yields the same colors.

mod chain;

pub use chain::{Resolved, ResolverChain, Stage};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::data::{ColorValue, DecorationColors, Rgb};

/// Center color when nothing upstream matches
pub const DEFAULT_CENTER: Rgb = Rgb::new(59, 130, 246);

/// Edge color when the center is not a triple to derive from
pub const DEFAULT_EDGE: Rgb = Rgb::new(37, 99, 235);

/// Per-channel offset between a center color and its derived edge
pub const EDGE_OFFSET: u8 = 30;

/// Raw attribute bags, scanned in this order
const RAW_ATTRIBUTE_BAGS: [&str; 2] = ["raw_full_user_attributes", "raw_user_attributes"];

/// Profile color ids 0-15
pub const PALETTE: [Rgb; 16] = [
    Rgb::new(170, 85, 0),    // orange
    Rgb::new(170, 0, 170),   // purple
    Rgb::new(0, 170, 170),   // cyan
    Rgb::new(170, 170, 0),   // yellow
    Rgb::new(0, 170, 0),     // green
    Rgb::new(170, 0, 0),     // red
    Rgb::new(0, 0, 170),     // blue
    Rgb::new(170, 0, 85),    // pink
    Rgb::new(0, 85, 170),    // light blue
    Rgb::new(85, 0, 170),    // violet
    Rgb::new(170, 85, 85),   // light red
    Rgb::new(85, 170, 0),    // light green
    Rgb::new(170, 170, 85),  // light yellow
    Rgb::new(85, 170, 170),  // light cyan
    Rgb::new(170, 85, 170),  // light purple
    Rgb::new(85, 85, 170),   // light violet
];

lazy_static! {
    static ref RGB_TRIPLE: Regex =
        Regex::new(r"(\d+),\s*(\d+),\s*(\d+)").expect("RGB triple pattern is valid");
    static ref RGB_TOKEN: Regex =
        Regex::new(r"(?i)RGB\((\d+),\s*(\d+),\s*(\d+)\)").expect("RGB token pattern is valid");

    static ref CENTER_CHAIN: ResolverChain<Value, ColorValue> = ResolverChain::new()
        .stage("worn_gift", worn_gift_stage("center_color"))
        .stage("palette", palette_stage("profile_color"))
        .stage("rgb_object", rgb_object_stage("profile_color"))
        .stage("rgb_string", rgb_string_stage("profile_color"))
        .stage("raw_attributes", raw_attributes_stage);

    static ref EDGE_CHAIN: ResolverChain<Value, ColorValue> = ResolverChain::new()
        .stage("worn_gift", worn_gift_stage("edge_color"))
        .stage("palette", palette_stage("profile_accent"))
        .stage("rgb_object", rgb_object_stage("profile_accent"))
        .stage("rgb_string", rgb_string_stage("profile_accent"));
}

/// Resolve the accent colors from a decoration lookup result
pub fn resolve(data: &Value) -> DecorationColors {
    let center_color = CENTER_CHAIN
        .resolve(data)
        .map(|resolved| resolved.value)
        .unwrap_or(ColorValue::Rgb(DEFAULT_CENTER));
    let edge_color = EDGE_CHAIN
        .resolve(data)
        .map(|resolved| resolved.value)
        .unwrap_or_else(|| derived_edge(&center_color));

    DecorationColors {
        center_color,
        edge_color,
        pattern_color: worn_gift_color(data, "pattern_color"),
        text_color: worn_gift_color(data, "text_color"),
    }
}

/// Name of the stage that supplies each color, `None` for the defaults
pub fn explain(data: &Value) -> (Option<&'static str>, Option<&'static str>) {
    (
        CENTER_CHAIN.resolve(data).map(|resolved| resolved.stage),
        EDGE_CHAIN.resolve(data).map(|resolved| resolved.stage),
    )
}

/// Edge derived from a center: darker by [`EDGE_OFFSET`], or the fixed
/// default when the center is only known as a string
pub fn derived_edge(center: &ColorValue) -> ColorValue {
    match center.as_rgb() {
        Some(rgb) => ColorValue::Rgb(rgb.darken(EDGE_OFFSET)),
        None => ColorValue::Rgb(DEFAULT_EDGE),
    }
}

/// Read a color reported directly: an `{r, g, b}` object or a non-empty string
pub fn color_from_value(value: &Value) -> Option<ColorValue> {
    match value {
        Value::Object(_) => rgb_from_object(value).map(ColorValue::Rgb),
        Value::String(text) if !text.trim().is_empty() => Some(ColorValue::Text(text.clone())),
        _ => None,
    }
}

// =============================================================================
// Stages
// =============================================================================

fn worn_gift_color(data: &Value, field: &str) -> Option<ColorValue> {
    data.get("worn_gift")
        .and_then(|worn| worn.get(field))
        .and_then(color_from_value)
}

fn worn_gift_stage(field: &'static str) -> impl Fn(&Value) -> Option<ColorValue> {
    move |data| worn_gift_color(data, field)
}

/// The value a color field carries: its `color` member when wrapped,
/// otherwise the value itself
fn color_candidate<'a>(data: &'a Value, field: &str) -> Option<&'a Value> {
    match data.get(field)? {
        Value::Object(map) if map.contains_key("color") => map.get("color"),
        Value::Null => None,
        other => Some(other),
    }
}

/// Palette ids arrive as numbers or as numeric strings (`"5"`)
fn palette_stage(field: &'static str) -> impl Fn(&Value) -> Option<ColorValue> {
    move |data| {
        let id = match color_candidate(data, field)? {
            Value::Number(number) => number.as_u64()?,
            Value::String(text) => text.trim().parse::<u64>().ok()?,
            _ => return None,
        };
        let index = usize::try_from(id).ok()?;
        PALETTE.get(index).copied().map(ColorValue::Rgb)
    }
}

fn rgb_object_stage(field: &'static str) -> impl Fn(&Value) -> Option<ColorValue> {
    move |data| {
        color_candidate(data, field)
            .and_then(rgb_from_object)
            .map(ColorValue::Rgb)
    }
}

fn rgb_string_stage(field: &'static str) -> impl Fn(&Value) -> Option<ColorValue> {
    move |data| {
        let text = color_candidate(data, field)?.as_str()?;
        if !text.to_ascii_lowercase().contains("rgb") {
            return None;
        }
        rgb_from_captures(&RGB_TRIPLE, text).map(ColorValue::Rgb)
    }
}

fn raw_attributes_stage(data: &Value) -> Option<ColorValue> {
    RAW_ATTRIBUTE_BAGS
        .iter()
        .filter_map(|bag| data.get(*bag).and_then(Value::as_object))
        .flat_map(|attributes| attributes.values())
        .filter_map(Value::as_str)
        .find_map(|text| rgb_from_captures(&RGB_TOKEN, text))
        .map(ColorValue::Rgb)
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// `{r, g, b}` with a numeric `r`; missing channels read as 0
fn rgb_from_object(value: &Value) -> Option<Rgb> {
    let object = value.as_object()?;
    let r = object.get("r")?.as_f64()?;
    let channel = |name: &str| object.get(name).and_then(Value::as_f64).unwrap_or(0.0);

    Some(Rgb::new(
        clamp_channel(r),
        clamp_channel(channel("g")),
        clamp_channel(channel("b")),
    ))
}

fn clamp_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn rgb_from_captures(pattern: &Regex, text: &str) -> Option<Rgb> {
    let captures = pattern.captures(text)?;
    let channel = |index: usize| -> Option<u8> {
        let digits = captures.get(index)?.as_str();
        let value: u64 = digits.parse().ok()?;
        Some(value.min(255) as u8)
    };

    Some(Rgb::new(channel(1)?, channel(2)?, channel(3)?))
}
