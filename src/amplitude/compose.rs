use std::fmt;

use crate::amplitude::{
    Batch, EventProperties, EventRecord, FirstTouch, IdentifyRecord, LastTouch, UserProperties,
    IDENTIFY_EVENT_TYPE,
};
use crate::branch::{self, EventKind, NormalizedEvent, Payload};

#[derive(Debug, Clone, PartialEq)]
pub enum Composition {
    Ready(Batch),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoDeviceId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkipReason::NoDeviceId => write!(f, "no device id"),
        }
    }
}

/// Turns one webhook body into the batch to deliver, or the reason there
/// is nothing to deliver.
pub fn compose(payload: Payload, now_millis: i64) -> Composition {
    let payload = payload.flatten_data();
    match branch::normalize(&payload, now_millis) {
        Some(event) => Composition::Ready(build_batch(&event)),
        None => Composition::Skipped(SkipReason::NoDeviceId),
    }
}

pub fn build_batch(event: &NormalizedEvent) -> Batch {
    let touch = &event.attribution;
    let installed_at = (event.kind == EventKind::Install).then_some(event.timestamp_millis);

    let identify = IdentifyRecord {
        device_id: event.device_id.clone(),
        event_type: IDENTIFY_EVENT_TYPE,
        time: event.timestamp_millis,
        user_properties: UserProperties {
            set_once: FirstTouch {
                first_touch_channel: touch.channel.clone(),
                first_touch_campaign: touch.campaign.clone(),
                first_touch_ad_partner: touch.ad_partner.clone(),
                first_touch_ad_set: touch.ad_set.clone(),
                first_touch_creative: touch.creative.clone(),
                install_time: installed_at,
            },
            set: LastTouch {
                last_touch_channel: touch.channel.clone(),
                last_touch_campaign: touch.campaign.clone(),
                last_touch_ad_partner: touch.ad_partner.clone(),
                last_touch_ad_set: touch.ad_set.clone(),
                last_touch_creative: touch.creative.clone(),
                last_touch_time: event.timestamp_millis,
            },
        },
    };

    let device = &event.device;
    let attributed = EventRecord {
        device_id: event.device_id.clone(),
        event_type: event.label.clone(),
        time: event.timestamp_millis,
        insert_id: event.insert_id.clone(),
        event_properties: EventProperties {
            install_type: event.kind.as_str(),
            channel: touch.channel.clone(),
            campaign: touch.campaign.clone(),
            ad_partner: touch.ad_partner.clone(),
            ad_set: touch.ad_set.clone(),
            creative: touch.creative.clone(),
            feature: touch.feature.clone(),
            link_id: touch.link_id.clone(),
            web_to_app: touch.web_to_app.unwrap_or(false),
            platform: device.platform,
            app_version: device.app_version.clone(),
            os_name: device.os_name.clone(),
            os_version: device.os_version.clone(),
            device_model: device.device_model.clone(),
        },
    };

    Batch {
        identify,
        event: attributed,
    }
}
