//! Field extractors. Each one is total: malformed input degrades to a
//! fallback value, it never errors.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use super::{get, string_field, AttributionFields, DeviceMeta, EventKind, Platform};

/// Identifier keys, matched case-insensitively.
const DEVICE_ID_KEYS: [&str; 5] = ["idfa", "idfv", "adid", "advertising_id", "gaid"];

/// Numeric timestamps at or below this are seconds.
const SECONDS_CEILING: f64 = 1e12;

const FALLBACK_LABEL: &str = "Branch Event";

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Picks the device id from the identity mapping.
///
/// Keys are visited in the order they appear in the payload and the first
/// recognized identifier with a non-blank string value wins. There is no
/// fixed precedence between idfa, idfv and the Android ids.
pub fn device_id(user_data: &Map<String, Value>) -> Option<String> {
    user_data
        .iter()
        .filter(|(key, _)| {
            DEVICE_ID_KEYS
                .iter()
                .any(|known| key.eq_ignore_ascii_case(known))
        })
        .filter_map(|(_, value)| value.as_str())
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

/// Event time in epoch milliseconds. Prefers `timestamp_millis` over
/// `timestamp`; falls back to `now_millis` when neither can be read.
pub fn timestamp_millis(payload: &Map<String, Value>, now_millis: i64) -> i64 {
    get(payload, "timestamp_millis")
        .or_else(|| get(payload, "timestamp"))
        .and_then(coerce_millis)
        .unwrap_or(now_millis)
}

pub fn coerce_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(scale_to_millis),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<f64>() {
                Ok(n) if n.is_finite() => scale_to_millis(n),
                _ => parse_datetime(s),
            }
        }
        _ => None,
    }
}

fn scale_to_millis(n: f64) -> Option<i64> {
    if !n.is_finite() || n < 0.0 {
        return None;
    }
    let millis = if n <= SECONDS_CEILING {
        (n * 1000.0).round()
    } else {
        n.round()
    };
    // `as` saturates, so bound the value before casting
    if millis > i64::MAX as f64 {
        return None;
    }
    let millis = millis as i64;
    DateTime::from_timestamp_millis(millis).map(|_| millis)
}

// strings without an offset are read as UTC
fn parse_datetime(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp_millis());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Maps the event name onto a kind and the label sent downstream.
///
/// The checks run in a fixed order, so a name mentioning both REINSTALL and
/// INSTALL is a reinstall.
pub fn event_type(payload: &Map<String, Value>) -> (EventKind, String) {
    let raw = event_name(payload, "name")
        .or_else(|| event_name(payload, "event"))
        .unwrap_or_default();
    let upper = raw.to_uppercase();

    if upper.contains("REINSTALL") {
        (EventKind::Reinstall, "Branch Reinstall".to_string())
    } else if upper.contains("INSTALL") {
        (EventKind::Install, "Branch Attributed Install".to_string())
    } else if upper.contains("OPEN") {
        (EventKind::Open, "Branch Open".to_string())
    } else if upper.is_empty() {
        (EventKind::Other, FALLBACK_LABEL.to_string())
    } else {
        (EventKind::Other, upper)
    }
}

fn event_name(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match get(payload, key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn attribution(touch: &Map<String, Value>) -> AttributionFields {
    AttributionFields {
        channel: string_field(touch, &["~channel", "channel"]),
        campaign: string_field(touch, &["~campaign", "campaign"]),
        ad_partner: string_field(
            touch,
            &["~advertising_partner_name", "advertising_partner_name", "ad_partner"],
        ),
        ad_set: string_field(touch, &["~ad_set_name", "ad_set_name", "ad_set"]),
        creative: string_field(touch, &["~creative_name", "creative_name", "creative"]),
        feature: string_field(touch, &["~feature", "feature"]),
        link_id: link_id_value(touch).and_then(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }),
        web_to_app: web_to_app(touch),
    }
}

/// The link id exactly as sent; Branch uses numbers here as often as strings.
pub fn link_id_value(touch: &Map<String, Value>) -> Option<&Value> {
    get(touch, "~id").or_else(|| get(touch, "link_id"))
}

fn web_to_app(touch: &Map<String, Value>) -> Option<bool> {
    match get(touch, "~web_to_app").or_else(|| get(touch, "web_to_app"))? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

pub fn device_meta(user_data: &Map<String, Value>) -> DeviceMeta {
    let os_name = string_field(user_data, &["os"]);
    let platform = match &os_name {
        Some(os) if os.to_lowercase().contains("android") => Platform::Android,
        _ => Platform::Ios,
    };

    DeviceMeta {
        app_version: string_field(user_data, &["app_version"]),
        os_version: string_field(user_data, &["os_version"]),
        device_model: string_field(user_data, &["model"]),
        os_name,
        platform,
    }
}
