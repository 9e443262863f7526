fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;

    use serde_json::{Value, json};
    use syncanvas_protocol::messages::{
        ErrorNotice, PresenceSnapshot, StrokeBatch, StrokeHistory, UndoNotice,
    };
    use syncanvas_protocol::{EventType, OutboundEvent, Payload, decode, encode_payload};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture file as raw text.
    fn load_raw(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> Value {
        serde_json::from_str(&load_raw(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Drops the server clock so frames from different runs compare equal.
    fn without_timestamp(mut v: Value) -> Value {
        if let Value::Object(map) = &mut v {
            map.remove("server_timestamp");
        }
        v
    }

    /// Encodes a payload and compares it with a captured server frame,
    /// ignoring `server_timestamp`.
    fn outbound_matches<P: Payload>(name: &str, payload: &P, from_user: &str) {
        let fixture = load_fixture(name);
        let event = encode_payload(payload, from_user).unwrap();
        let encoded = serde_json::to_value(&event).unwrap();

        assert_eq!(
            without_timestamp(encoded),
            without_timestamp(fixture),
            "encoded frame differs from fixture {name}"
        );
    }

    // -----------------------------------------------------------------------
    // Client → server frames
    // -----------------------------------------------------------------------

    #[test]
    fn client_join() {
        let event = decode(&load_raw("client/join.json")).unwrap();
        assert_eq!(event.event_type(), Some(EventType::Join));
        assert_eq!(event.identity_field("user_id"), Some("u_k3f9"));
        assert_eq!(event.identity_field("display_name"), Some("Ada"));
    }

    #[test]
    fn client_stroke_batch() {
        let event = decode(&load_raw("client/stroke_batch.json")).unwrap();
        assert_eq!(event.event_type(), Some(EventType::StrokeBatch));

        let strokes = event.strokes();
        assert_eq!(strokes.len(), 2);
        assert_eq!(strokes[0]["id"], "u_k3f9_1718000000123");
        assert_eq!(strokes[0]["points"][1], json!([11, 21.25]));
        assert_eq!(strokes[1]["color"], "#FFFFFF");
        assert_eq!(event.get("timestamp"), Some(&json!(1718000000300_i64)));
        // The browser leaves display_name off stroke batches.
        assert_eq!(event.identity_field("display_name"), None);
    }

    #[test]
    fn client_cursor_move() {
        let event = decode(&load_raw("client/cursor_move.json")).unwrap();
        assert_eq!(event.event_type(), Some(EventType::CursorMove));
        assert_eq!(event.get("x"), Some(&json!(312.5)));
        assert_eq!(event.get("y"), Some(&json!(88)));
        assert_eq!(event.get("tool"), Some(&json!("pen")));
        assert_eq!(event.identity_field("display_name"), Some("Ada"));
    }

    #[test]
    fn client_undo() {
        let event = decode(&load_raw("client/undo.json")).unwrap();
        assert_eq!(event.event_type(), Some(EventType::Undo));
        assert_eq!(event.non_empty("stroke_id"), Some(&json!("u_k3f9_1718000000123")));
    }

    #[test]
    fn client_redo() {
        let event = decode(&load_raw("client/redo.json")).unwrap();
        assert_eq!(event.event_type(), Some(EventType::Redo));
        let stroke = event.non_empty("stroke").unwrap();
        assert_eq!(stroke["id"], "u_k3f9_1718000000123");
        assert_eq!(stroke["width"], 2);
    }

    #[test]
    fn client_leave_and_clear() {
        let leave = decode(&load_raw("client/leave.json")).unwrap();
        assert_eq!(leave.event_type(), Some(EventType::Leave));
        assert_eq!(leave.identity_field("user_id"), Some("u_k3f9"));

        let clear = decode(&load_raw("client/clear_canvas.json")).unwrap();
        assert_eq!(clear.event_type(), Some(EventType::ClearCanvas));
    }

    #[test]
    fn every_client_frame_is_inbound() {
        for name in [
            "join",
            "stroke_batch",
            "cursor_move",
            "undo",
            "redo",
            "leave",
            "clear_canvas",
        ] {
            let event = decode(&load_raw(&format!("client/{name}.json"))).unwrap();
            let ty = event.event_type().unwrap_or_else(|| panic!("{name}: unknown type"));
            assert!(ty.is_inbound(), "{name} should be accepted from clients");
            assert_eq!(ty.as_str(), name);
        }
    }

    // -----------------------------------------------------------------------
    // Server → client frames
    // -----------------------------------------------------------------------

    #[test]
    fn server_history() {
        let fixture = load_fixture("server/history.json");
        let payload = StrokeHistory {
            strokes: fixture["strokes"].as_array().unwrap().clone(),
        };
        outbound_matches("server/history.json", &payload, "server");
    }

    #[test]
    fn server_presence_snapshot() {
        let presence = BTreeMap::from([
            ("u_k3f9".to_owned(), "Ada".to_owned()),
            ("u_p2x1".to_owned(), "Grace".to_owned()),
        ]);
        outbound_matches(
            "server/presence_snapshot.json",
            &PresenceSnapshot { presence },
            "server",
        );
    }

    #[test]
    fn server_relayed_batch() {
        let client = load_fixture("client/stroke_batch.json");
        let payload = StrokeBatch {
            strokes: vec![client["strokes"][0].clone()],
            timestamp: client["timestamp"].clone(),
            display_name: "Ada".into(),
            user_id: "u_k3f9".into(),
        };
        outbound_matches("server/relayed_batch.json", &payload, "u_k3f9");
    }

    #[test]
    fn server_undo_notice() {
        let payload = UndoNotice {
            stroke_id: json!("u_k3f9_1718000000123"),
            removed: true,
            user_id: "u_k3f9".into(),
        };
        outbound_matches("server/undo_notice.json", &payload, "server");
    }

    #[test]
    fn server_error() {
        let payload = ErrorNotice {
            message: "unknown_event_type: erase_all".into(),
        };
        outbound_matches("server/error.json", &payload, "server");
    }

    #[test]
    fn server_frames_parse_as_outbound() {
        for name in [
            "history",
            "presence_snapshot",
            "relayed_batch",
            "undo_notice",
            "error",
        ] {
            let fixture = load_fixture(&format!("server/{name}.json"));
            let event: OutboundEvent = serde_json::from_value(fixture).unwrap();
            assert!(event.event_type().is_some(), "{name}: unknown type");
            assert!(event.from_user().is_some(), "{name}: missing from_user");
            assert_eq!(event.server_timestamp(), Some(1718000001000));
        }
    }
}
