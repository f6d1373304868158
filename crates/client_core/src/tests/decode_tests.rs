use ledger::{RawEvent, RawObject};
use serde_json::json;
use shared::{domain::PollId, error::DiscoveryError};

use super::*;

fn raw_object(kind: &str, fields: serde_json::Value) -> RawObject {
    RawObject {
        object_id: PollId::new("0xpoll"),
        kind: kind.into(),
        owner: None,
        fields,
    }
}

#[test]
fn wrong_content_kind_decodes_to_absent() {
    let object = raw_object("package", json!({ "title": "x" }));
    assert!(decode_poll_fields(&object).is_none());
}

#[test]
fn missing_field_map_decodes_to_absent() {
    let object = raw_object(POLL_OBJECT_KIND, json!(null));
    assert!(decode_poll_fields(&object).is_none());
}

#[test]
fn missing_fields_coerce_to_defaults() {
    let object = raw_object(POLL_OBJECT_KIND, json!({}));
    let record = decode_poll_fields(&object).expect("empty field bag still decodes");
    assert_eq!(record.title, "");
    assert_eq!(record.description, "");
    assert_eq!(record.yes_count, 0);
    assert_eq!(record.no_count, 0);
    assert_eq!(record.total_votes, 0);
}

#[test]
fn counts_parse_from_strings_and_numbers() {
    let object = raw_object(
        POLL_OBJECT_KIND,
        json!({
            "creator": "0xalice",
            "title": "Will X happen?",
            "yes_count": "2",
            "no_count": 1,
            "total_votes": "3",
        }),
    );
    let record = decode_poll_fields(&object).unwrap();
    assert_eq!(record.yes_count, 2);
    assert_eq!(record.no_count, 1);
    assert_eq!(record.total_votes, 3);
    assert!(record.tally_consistent());
}

#[test]
fn unparsable_counts_coerce_to_zero_without_faulting() {
    let object = raw_object(
        POLL_OBJECT_KIND,
        json!({ "yes_count": "not-a-number", "no_count": -4, "total_votes": {} }),
    );
    let record = decode_poll_fields(&object).unwrap();
    assert_eq!(record.yes_count, 0);
    assert_eq!(record.no_count, 0);
    assert_eq!(record.total_votes, 0);
}

fn creation_event(payload: serde_json::Value) -> RawEvent {
    RawEvent {
        event_type: "0xpkg::contract::PollCreated".into(),
        payload,
    }
}

#[test]
fn creation_event_decodes_all_fields() {
    let event = creation_event(json!({
        "poll_id": "0xpoll",
        "creator": "0xalice",
        "title": "Will X happen?",
        "description": "maybe",
    }));
    let entry = decode_creation_event(0, &event).unwrap();
    assert_eq!(entry.poll_id, PollId::new("0xpoll"));
    assert_eq!(entry.title, "Will X happen?");
    assert_eq!(entry.description, "maybe");
}

#[test]
fn creation_event_tolerates_only_a_missing_description() {
    let event = creation_event(json!({
        "poll_id": "0xpoll",
        "creator": "0xalice",
        "title": "Will X happen?",
    }));
    let entry = decode_creation_event(0, &event).unwrap();
    assert_eq!(entry.description, "");

    let missing_title = creation_event(json!({
        "poll_id": "0xpoll",
        "creator": "0xalice",
    }));
    let err = decode_creation_event(3, &missing_title).unwrap_err();
    assert!(matches!(
        err,
        DiscoveryError::DecodeInvalid { position: 3, .. }
    ));
}

#[test]
fn non_object_event_payload_is_rejected() {
    let event = creation_event(json!("just a string"));
    assert!(decode_creation_event(1, &event).is_err());
}
