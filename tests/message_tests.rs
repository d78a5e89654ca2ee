// Wire protocol serde tests: inbound lifecycle events and outbound control
// messages, using payloads shaped like the service actually sends.

use live_transcribe::streaming::{ClientMessage, ServerMessage};

#[test]
fn begin_event_parses() {
    let json = r#"{"type":"Begin","id":"abc123","expires_at":1717000000}"#;

    match serde_json::from_str::<ServerMessage>(json).unwrap() {
        ServerMessage::Begin(event) => {
            assert_eq!(event.id, "abc123");
            assert_eq!(event.expires_at, Some(1717000000));
        }
        other => panic!("expected Begin, got {other:?}"),
    }
}

#[test]
fn turn_event_parses_with_all_flags() {
    let json = r#"{
        "type": "Turn",
        "turn_order": 3,
        "transcript": "hello world",
        "end_of_turn": true,
        "turn_is_formatted": false,
        "end_of_turn_confidence": 0.87
    }"#;

    match serde_json::from_str::<ServerMessage>(json).unwrap() {
        ServerMessage::Turn(event) => {
            assert_eq!(event.transcript, "hello world");
            assert!(event.end_of_turn);
            assert!(!event.turn_is_formatted);
            assert_eq!(event.turn_order, 3);
            assert_eq!(event.end_of_turn_confidence, Some(0.87));
        }
        other => panic!("expected Turn, got {other:?}"),
    }
}

#[test]
fn turn_event_tolerates_missing_optional_fields() {
    // Early partial turns arrive with a bare transcript
    let json = r#"{"type":"Turn","transcript":"hel"}"#;

    match serde_json::from_str::<ServerMessage>(json).unwrap() {
        ServerMessage::Turn(event) => {
            assert_eq!(event.transcript, "hel");
            assert!(!event.end_of_turn);
            assert!(!event.turn_is_formatted);
        }
        other => panic!("expected Turn, got {other:?}"),
    }
}

#[test]
fn turn_event_ignores_unknown_fields() {
    let json = r#"{"type":"Turn","transcript":"hi","end_of_turn":false,"words":[{"text":"hi","start":0,"end":120}]}"#;

    assert!(matches!(
        serde_json::from_str::<ServerMessage>(json).unwrap(),
        ServerMessage::Turn(_)
    ));
}

#[test]
fn termination_event_parses() {
    let json = r#"{"type":"Termination","audio_duration_seconds":42.5,"session_duration_seconds":44.0}"#;

    match serde_json::from_str::<ServerMessage>(json).unwrap() {
        ServerMessage::Termination(event) => {
            assert_eq!(event.audio_duration_seconds, 42.5);
            assert_eq!(event.session_duration_seconds, Some(44.0));
        }
        other => panic!("expected Termination, got {other:?}"),
    }
}

#[test]
fn update_configuration_encodes_with_type_tag() {
    let msg = ClientMessage::UpdateConfiguration { format_turns: true };
    let json = serde_json::to_string(&msg).unwrap();

    assert!(json.contains("\"type\":\"UpdateConfiguration\""));
    assert!(json.contains("\"format_turns\":true"));
}

#[test]
fn terminate_encodes_with_type_tag() {
    let msg = ClientMessage::Terminate;
    let json = serde_json::to_string(&msg).unwrap();

    assert_eq!(json, r#"{"type":"Terminate"}"#);
}
