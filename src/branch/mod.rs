//! Inbound side: the loosely typed attribution payload and its normalized form.

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Map, Value};

pub mod extract;
pub mod insert_id;

const USER_DATA: &str = "user_data";
const LAST_TOUCH: &str = "last_attributed_touch_data";
const WRAPPER: &str = "data";

/// Raw webhook body. Nothing in it is trusted to be present or well typed,
/// so every read goes through the accessors below.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Only JSON objects are payloads.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Payload(fields)),
            _ => None,
        }
    }

    /// Lifts an object found under `data` to the top level. Inner keys win.
    pub fn flatten_data(mut self) -> Self {
        if !matches!(self.0.get(WRAPPER), Some(Value::Object(_))) {
            return self;
        }
        if let Some(Value::Object(inner)) = self.0.shift_remove(WRAPPER) {
            for (key, value) in inner {
                self.0.insert(key, value);
            }
        }
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Value under `key`, with JSON null treated as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        get(&self.0, key)
    }

    pub fn user_data(&self) -> &Map<String, Value> {
        object(&self.0, USER_DATA)
    }

    pub fn last_touch(&self) -> &Map<String, Value> {
        object(&self.0, LAST_TOUCH)
    }
}

static EMPTY: Lazy<Map<String, Value>> = Lazy::new(Map::new);

pub(crate) fn get<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

/// Nested mapping under `key`; anything that is not an object reads as empty.
pub(crate) fn object<'a>(fields: &'a Map<String, Value>, key: &str) -> &'a Map<String, Value> {
    match fields.get(key) {
        Some(Value::Object(inner)) => inner,
        _ => &*EMPTY,
    }
}

/// First of `keys` holding a non-blank string.
pub(crate) fn string_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| fields.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Install,
    Reinstall,
    Open,
    Other,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Reinstall => "reinstall",
            EventKind::Open => "open",
            EventKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributionFields {
    pub channel: Option<String>,
    pub campaign: Option<String>,
    pub ad_partner: Option<String>,
    pub ad_set: Option<String>,
    pub creative: Option<String>,
    pub feature: Option<String>,
    pub link_id: Option<String>,
    pub web_to_app: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    #[serde(rename = "iOS")]
    Ios,
    #[serde(rename = "Android")]
    Android,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMeta {
    pub app_version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub device_model: Option<String>,
    pub platform: Platform,
}

/// Everything the composer needs, derived once per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub device_id: String,
    pub timestamp_millis: i64,
    pub kind: EventKind,
    pub label: String,
    pub attribution: AttributionFields,
    pub device: DeviceMeta,
    pub insert_id: String,
}

/// Returns `None` when the payload carries no usable device identifier.
pub fn normalize(payload: &Payload, now_millis: i64) -> Option<NormalizedEvent> {
    let device_id = extract::device_id(payload.user_data())?;
    let timestamp_millis = extract::timestamp_millis(payload.fields(), now_millis);
    let (kind, label) = extract::event_type(payload.fields());
    let touch = payload.last_touch();

    let insert_id = insert_id::build(
        payload.get("id"),
        payload.get("name"),
        payload.get("event"),
        timestamp_millis,
        &label,
        extract::link_id_value(touch),
    );

    Some(NormalizedEvent {
        device_id,
        timestamp_millis,
        kind,
        label,
        attribution: extract::attribution(touch),
        device: extract::device_meta(payload.user_data()),
        insert_id,
    })
}
