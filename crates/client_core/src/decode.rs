//! The single validating boundary between raw ledger payloads and typed
//! records. Nothing downstream touches an undecoded field bag.

use ledger::{RawEvent, RawObject};
use serde_json::{Map, Value};
use shared::{
    domain::{Address, PollId, PollListEntry, PollRecord},
    error::DiscoveryError,
};
use tracing::warn;

/// Content kind the contract's poll objects declare.
pub const POLL_OBJECT_KIND: &str = "moveObject";

/// Decode a raw object's field bag into a `PollRecord`. Returns `None` when
/// the declared kind is wrong or the payload carries no field map at all;
/// within a recognized payload, missing or unparsable fields coerce to safe
/// defaults rather than failing.
pub fn decode_poll_fields(object: &RawObject) -> Option<PollRecord> {
    if object.kind != POLL_OBJECT_KIND {
        warn!(
            object_id = %object.object_id,
            kind = %object.kind,
            "object content is not a {POLL_OBJECT_KIND}"
        );
        return None;
    }

    let Some(fields) = object.fields.as_object() else {
        warn!(object_id = %object.object_id, "object has no field map");
        return None;
    };

    Some(PollRecord {
        creator: Address::new(text_field(fields, "creator")),
        title: text_field(fields, "title"),
        description: text_field(fields, "description"),
        yes_count: count_field(fields, "yes_count"),
        no_count: count_field(fields, "no_count"),
        total_votes: count_field(fields, "total_votes"),
    })
}

/// Decode one creation event into a `PollListEntry`. Unlike object decode,
/// this is strict: a malformed event fails the whole discovery refresh, so
/// a partially wrong list is never shown.
pub fn decode_creation_event(
    position: usize,
    event: &RawEvent,
) -> Result<PollListEntry, DiscoveryError> {
    let fields = event
        .payload
        .as_object()
        .ok_or_else(|| malformed(position, "payload is not an object"))?;

    let poll_id = required_text(fields, "poll_id", position)?;
    let creator = required_text(fields, "creator", position)?;
    let title = required_text(fields, "title", position)?;

    Ok(PollListEntry {
        poll_id: PollId::new(poll_id),
        creator: Address::new(creator),
        title: title.to_string(),
        // Creation-time description may legitimately be empty.
        description: text_field(fields, "description"),
    })
}

fn malformed(position: usize, reason: impl Into<String>) -> DiscoveryError {
    DiscoveryError::DecodeInvalid {
        position,
        reason: reason.into(),
    }
}

fn required_text<'a>(
    fields: &'a Map<String, Value>,
    key: &str,
    position: usize,
) -> Result<&'a str, DiscoveryError> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(position, format!("missing or non-text field `{key}`")))
}

fn text_field(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Counts arrive as JSON strings on this ledger, but numbers are tolerated.
/// Anything unparsable coerces to 0; parsing must never fault.
fn count_field(fields: &Map<String, Value>, key: &str) -> u64 {
    match fields.get(key) {
        Some(Value::Number(number)) => number.as_u64().unwrap_or(0),
        Some(Value::String(text)) => text.parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
#[path = "tests/decode_tests.rs"]
mod tests;
