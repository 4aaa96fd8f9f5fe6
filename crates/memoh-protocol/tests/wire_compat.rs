use memoh_protocol::agent_event::AgentEvent;
use memoh_protocol::rpc::{InboundFrame, ResFrame};
use memoh_protocol::stream_event::{LegacySseEvent, MessageContent};

#[test]
fn req_frame_round_trip() {
    let json = r#"{"type":"req","id":"abc-123","method":"tool.call","params":{"name":"x"}}"#;
    let frame: InboundFrame = serde_json::from_str(json).unwrap();
    let req = frame.as_req().unwrap();
    assert_eq!(req.method, "tool.call");
    assert_eq!(req.id, "abc-123");
}

#[test]
fn res_err_has_no_payload_field() {
    let res = ResFrame::err("req-2", "AUTH_FAILED", "bad token");
    let json = serde_json::to_string(&res).unwrap();
    assert!(json.contains(r#""ok":false"#));
    assert!(!json.contains(r#""payload""#));
}

#[test]
fn agent_event_tag_matches_type_name() {
    let ev = AgentEvent::TextDelta { delta: "hi".into() };
    let json = serde_json::to_value(&ev).unwrap();
    assert_eq!(json["type"], ev.type_name());
    assert_eq!(json["delta"], "hi");
}

#[test]
fn tool_call_pairing_round_trip() {
    let start = AgentEvent::ToolCallStart {
        call_id: "c1".into(),
        name: "memory.search".into(),
        input: serde_json::json!({"q": "tea"}),
    };
    let end = AgentEvent::ToolCallEnd {
        call_id: "c1".into(),
        result: serde_json::json!({"ok": true}),
    };
    let s: AgentEvent = serde_json::from_value(serde_json::to_value(&start).unwrap()).unwrap();
    let e: AgentEvent = serde_json::from_value(serde_json::to_value(&end).unwrap()).unwrap();
    assert_eq!(s, start);
    assert_eq!(e, end);
}

#[test]
fn legacy_sse_maps_processing_failed_to_error() {
    let ev = AgentEvent::ProcessingFailed { error: "step limit".into() };
    let legacy = LegacySseEvent::from_agent_event(&ev);
    assert_eq!(legacy.kind, "error");
    assert_eq!(legacy.error.as_deref(), Some("step limit"));
}

#[test]
fn message_content_text_variant_decodes() {
    let json = r#"{"text":"hello","attachments":["/a.pdf"]}"#;
    let content: MessageContent = serde_json::from_str(json).unwrap();
    match content {
        MessageContent::Text { text, attachments } => {
            assert_eq!(text, "hello");
            assert_eq!(attachments, vec!["/a.pdf".to_string()]);
        }
        _ => panic!("expected Text variant"),
    }
}

#[test]
fn message_content_parts_variant_decodes() {
    let json = r#"[{"type":"text","text":"hi"},{"type":"tool_call","call_id":"c1","name":"web.fetch","input":{}}]"#;
    let content: MessageContent = serde_json::from_str(json).unwrap();
    match content {
        MessageContent::Parts(blocks) => assert_eq!(blocks.len(), 2),
        _ => panic!("expected Parts variant"),
    }
}
