use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

// Field order here is the serialization order, and so part of the key.
#[derive(Serialize)]
struct Seed<'a> {
    id: Option<&'a Value>,
    name: Option<&'a Value>,
    event: Option<&'a Value>,
    timestamp: i64,
    label: &'a str,
    link_id: Option<&'a Value>,
}

/// Deterministic dedupe key for the ingestion API: sha256 over the JSON
/// encoding of the six identifying fields, as 64 lowercase hex chars.
/// Absent fields are encoded as `null`.
pub fn build(
    id: Option<&Value>,
    name: Option<&Value>,
    event: Option<&Value>,
    timestamp_millis: i64,
    label: &str,
    link_id: Option<&Value>,
) -> String {
    let seed = Seed {
        id,
        name,
        event,
        timestamp: timestamp_millis,
        label,
        link_id,
    };
    // a struct of plain JSON values always serializes
    let material = serde_json::to_vec(&seed).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&material);
    format!("{:x}", hasher.finalize())
}
