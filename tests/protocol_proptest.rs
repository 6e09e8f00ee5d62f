//! Property-based tests for the wire protocol and identity resolution.

use proptest::prelude::*;

use inkboard::backend::auth::{identity, resolve_identity};
use inkboard::shared::event::{DrawEvent, EventBody, Point, StrokePayload};
use inkboard::shared::protocol::decode_client_frame;

proptest! {
    #[test]
    fn frame_decoding_never_panics(input in ".*") {
        // Malformed input must map to an error frame, not a crash.
        let _ = decode_client_frame(&input);
    }

    #[test]
    fn frame_decoding_never_panics_on_json_objects(
        kind in "[A-Z_]{1,16}",
        number in any::<i64>(),
    ) {
        let frame = format!(r#"{{"type":"{kind}","payload":{{"x":{number}}}}}"#);
        let _ = decode_client_frame(&frame);
    }

    #[test]
    fn verified_subject_always_wins(
        subject in "[a-z0-9-]{1,32}",
        client in proptest::option::of("[a-z0-9-]{1,32}"),
        name in proptest::option::of(".{0,24}"),
        anonymous in any::<bool>(),
    ) {
        let resolved = resolve_identity(Some(subject.clone()), client, name, anonymous);
        prop_assert_eq!(resolved.user_id, subject);
        prop_assert!(!resolved.is_anonymous);
    }

    #[test]
    fn identity_is_deterministic_per_user_id(user in "[a-z0-9-]{1,32}") {
        prop_assert_eq!(identity::anonymous_name(&user), identity::anonymous_name(&user));
        let color = identity::avatar_color(&user);
        prop_assert_eq!(identity::avatar_color(&user), color.clone());
        prop_assert!(color.starts_with('#'));
        prop_assert_eq!(color.len(), 7);
    }

    #[test]
    fn draw_event_survives_the_wire(
        seq in 1i64..1_000_000,
        x in -10_000.0f64..10_000.0,
        y in -10_000.0f64..10_000.0,
        width in 0.5f64..64.0,
    ) {
        let event = DrawEvent {
            board_id: "board".to_string(),
            seq,
            user_id: "user".to_string(),
            timestamp: 1_700_000_000_000,
            body: EventBody::Stroke(StrokePayload {
                stroke_id: "s1".to_string(),
                color: "#abcdef".to_string(),
                width,
                opacity: Some(0.5),
                points: vec![Point { x, y }],
            }),
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: DrawEvent = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, event);
    }
}
