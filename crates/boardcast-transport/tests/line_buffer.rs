//! Integration tests for NDJSON framing as seen by stream readers.

use boardcast_transport::LineBuffer;

// =========================================================================
// Realistic stream traffic
// =========================================================================

#[test]
fn test_push_interleaved_events_and_keepalives_preserves_order() {
    let mut buf = LineBuffer::default();
    let mut lines = Vec::new();
    for chunk in [
        &b"{\"type\":\"gameFull\",\"id\":\"abc\"}\n"[..],
        b"\n",
        b"{\"type\":\"gameSta",
        b"te\",\"moves\":\"e2e4\"}\r\n",
    ] {
        lines.extend(buf.push(chunk));
    }

    assert_eq!(
        lines,
        vec![
            r#"{"type":"gameFull","id":"abc"}"#.to_string(),
            String::new(),
            r#"{"type":"gameState","moves":"e2e4"}"#.to_string(),
        ]
    );
}

#[test]
fn test_push_invalid_utf8_is_replaced_not_dropped() {
    let mut buf = LineBuffer::default();
    let lines = buf.push(b"ok\xff\n");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("ok"));
}

#[test]
fn test_push_recovers_after_overflow() {
    let mut buf = LineBuffer::new(8);
    let mut lines = buf.push(&[b'x'; 32]);
    assert!(lines.is_empty());
    lines.extend(buf.push(b"\n{\"a\":1}\n"));
    assert_eq!(lines, vec![r#"{"a":1}"#.to_string()]);
    assert_eq!(buf.overflows(), 1);
}

#[test]
fn test_new_zero_cap_is_clamped() {
    let mut buf = LineBuffer::new(0);
    assert_eq!(buf.push(b"a\n"), vec!["a".to_string()]);
}
