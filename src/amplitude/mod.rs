//! Outbound side: the records sent to the ingestion API.

use serde::Serialize;

use crate::branch::Platform;

pub mod client;
pub mod compose;

pub const IDENTIFY_EVENT_TYPE: &str = "$identify";

/// Profile update for the device. Delivered ahead of the event it annotates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifyRecord {
    pub device_id: String,
    pub event_type: &'static str,
    pub time: i64,
    pub user_properties: UserProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProperties {
    /// Never overwrites an existing first touch.
    #[serde(rename = "$setOnce")]
    pub set_once: FirstTouch,
    #[serde(rename = "$set")]
    pub set: LastTouch,
}

// Attribution values are sent as null when unknown, on purpose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirstTouch {
    pub first_touch_channel: Option<String>,
    pub first_touch_campaign: Option<String>,
    pub first_touch_ad_partner: Option<String>,
    pub first_touch_ad_set: Option<String>,
    pub first_touch_creative: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastTouch {
    pub last_touch_channel: Option<String>,
    pub last_touch_campaign: Option<String>,
    pub last_touch_ad_partner: Option<String>,
    pub last_touch_ad_set: Option<String>,
    pub last_touch_creative: Option<String>,
    pub last_touch_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub device_id: String,
    pub event_type: String,
    pub time: i64,
    pub insert_id: String,
    pub event_properties: EventProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventProperties {
    pub install_type: &'static str,
    pub channel: Option<String>,
    pub campaign: Option<String>,
    pub ad_partner: Option<String>,
    pub ad_set: Option<String>,
    pub creative: Option<String>,
    pub feature: Option<String>,
    pub link_id: Option<String>,
    pub web_to_app: bool,
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
}

/// The two records produced by one webhook, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub identify: IdentifyRecord,
    pub event: EventRecord,
}

impl Batch {
    pub fn insert_id(&self) -> &str {
        &self.event.insert_id
    }
}

/// Body of `POST /2/httpapi`.
#[derive(Debug, Serialize)]
pub struct UploadRequest<'a> {
    pub api_key: &'a str,
    pub events: (&'a IdentifyRecord, &'a EventRecord),
}

impl<'a> UploadRequest<'a> {
    pub fn new(api_key: &'a str, batch: &'a Batch) -> Self {
        UploadRequest {
            api_key,
            events: (&batch.identify, &batch.event),
        }
    }
}
