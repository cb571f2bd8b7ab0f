//! Wire envelopes exchanged between the coordinator and renderer clients.
//!
//! Framing is one JSON object per line:
//! `{"type": "...", "payload": {...}, "client_id": "..."}`. [`Body`] is an
//! adjacently tagged enum, so every tag decodes straight into its own
//! payload type.

use std::borrow::Cow;
use std::io::{self, BufRead, Read};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    Subscribe,
    Unsubscribe,
    Resize,
    ViewportUpdate,
    Input,
    Render,
    Menu,
    Ping,
    Pong,
}

impl MessageType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "subscribe" => MessageType::Subscribe,
            "unsubscribe" => MessageType::Unsubscribe,
            "resize" => MessageType::Resize,
            "viewport_update" => MessageType::ViewportUpdate,
            "input" => MessageType::Input,
            "render" => MessageType::Render,
            "menu" => MessageType::Menu,
            "ping" => MessageType::Ping,
            "pong" => MessageType::Pong,
            _ => return None,
        })
    }
}

/// Typed message body; one concrete payload shape per tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Body {
    Subscribe(SubscribePayload),
    Unsubscribe,
    Resize(ResizePayload),
    ViewportUpdate(ViewportPayload),
    Input(InputPayload),
    Render(RenderPayload),
    Menu(MenuPayload),
    Ping,
    Pong,
}

impl Body {
    pub fn kind(&self) -> MessageType {
        match self {
            Body::Subscribe(_) => MessageType::Subscribe,
            Body::Unsubscribe => MessageType::Unsubscribe,
            Body::Resize(_) => MessageType::Resize,
            Body::ViewportUpdate(_) => MessageType::ViewportUpdate,
            Body::Input(_) => MessageType::Input,
            Body::Render(_) => MessageType::Render,
            Body::Menu(_) => MessageType::Menu,
            Body::Ping => MessageType::Ping,
            Body::Pong => MessageType::Pong,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub body: Body,
    #[serde(default)]
    pub client_id: String,
}

/// Just the tag, read ahead of the full decode so an unknown type and a
/// payload that does not fit its type are reported apart.
#[derive(Deserialize)]
struct Tag<'a> {
    #[serde(rename = "type", borrow)]
    kind: Cow<'a, str>,
}

impl Message {
    pub fn new(client_id: impl Into<String>, body: Body) -> Self {
        Message { client_id: client_id.into(), body }
    }

    /// Encode as a single line, newline included.
    pub fn encode(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one line. Malformed JSON, unknown tags and payloads that do not
    /// fit their tag are all reported as errors; callers skip the line.
    pub fn decode(line: &str) -> Result<Message> {
        let line = line.trim_end();
        let tag: Tag<'_> = serde_json::from_str(line)?;
        let kind = MessageType::from_tag(&tag.kind).ok_or_else(|| Error::UnknownMessage(tag.kind.to_string()))?;
        serde_json::from_str(line).map_err(|source| Error::BadPayload { kind, source })
    }
}

pub(crate) enum Frame {
    Line,
    Oversized,
    Eof,
}

/// Read one newline-terminated frame into `buf`, at most `max` bytes.
/// An oversized frame is drained up to its newline and reported so the
/// caller can skip it without losing framing.
pub(crate) fn read_frame<R: BufRead>(r: &mut R, buf: &mut Vec<u8>, max: usize) -> io::Result<Frame> {
    buf.clear();
    let n = r.by_ref().take(max as u64 + 1).read_until(b'\n', buf)?;
    if n == 0 { return Ok(Frame::Eof); }
    if buf.last() == Some(&b'\n') || buf.len() <= max { return Ok(Frame::Line); }
    let mut scratch = Vec::new();
    loop {
        scratch.clear();
        let n = r.by_ref().take(64 * 1024).read_until(b'\n', &mut scratch)?;
        if n == 0 || scratch.last() == Some(&b'\n') { break; }
    }
    buf.clear();
    Ok(Frame::Oversized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_decodes_into_typed_payload() {
        let line = r#"{"type":"subscribe","client_id":"sidebar-@1","payload":{"width":30,"height":40,"color_profile":"ansi256","pane_id":"%3"}}"#;
        let msg = Message::decode(line).unwrap();
        assert_eq!(msg.client_id, "sidebar-@1");
        match msg.body {
            Body::Subscribe(p) => {
                assert_eq!((p.width, p.height), (30, 40));
                assert_eq!(p.color_profile, ColorProfile::Ansi256);
                assert_eq!(p.pane_id, "%3");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn payloadless_messages_omit_payload() {
        let line = Message::new("c1", Body::Ping).encode().unwrap();
        assert_eq!(line, "{\"type\":\"ping\",\"client_id\":\"c1\"}\n");
        assert_eq!(Message::decode(&line).unwrap().body, Body::Ping);
    }

    #[test]
    fn unknown_type_is_reported() {
        let err = Message::decode(r#"{"type":"teleport","client_id":"c1"}"#).unwrap_err();
        assert!(matches!(err, Error::UnknownMessage(ref k) if k == "teleport"));
    }

    #[test]
    fn payload_shape_is_checked_per_tag() {
        let err = Message::decode(r#"{"type":"resize","client_id":"c1","payload":{"width":"wide"}}"#).unwrap_err();
        assert!(matches!(err, Error::BadPayload { kind: MessageType::Resize, .. }));
        let err = Message::decode("not json at all").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn menu_select_carries_index_in_mouse_x() {
        let input = InputPayload {
            kind: InputKind::MenuSelect,
            mouse_x: MENU_CANCEL,
            action: "press".into(),
            ..Default::default()
        };
        let line = Message::new("c1", Body::Input(input)).encode().unwrap();
        assert!(line.contains("\"type\":\"menu_select\""));
        assert!(line.contains("\"mouse_x\":-1"));
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn payload_follows_its_tag_on_the_wire() {
        let body = Body::ViewportUpdate(ViewportPayload { viewport_offset: 7 });
        let line = Message::new("c1", body.clone()).encode().unwrap();
        assert_eq!(line, "{\"type\":\"viewport_update\",\"payload\":{\"viewport_offset\":7},\"client_id\":\"c1\"}\n");
        let reordered = r#"{"client_id":"c1","payload":{"viewport_offset":7},"type":"viewport_update"}"#;
        assert_eq!(Message::decode(reordered).unwrap().body, body);
        let err = Message::decode(r#"{"type":"subscribe","client_id":"c1"}"#).unwrap_err();
        assert!(matches!(err, Error::BadPayload { kind: MessageType::Subscribe, .. }));
    }

    #[test]
    fn oversized_frame_is_skipped_without_losing_the_next_one() {
        let data = format!("{}\n{{\"type\":\"ping\"}}\n", "x".repeat(100));
        let mut r = io::BufReader::with_capacity(16, io::Cursor::new(data.into_bytes()));
        let mut buf = Vec::new();
        assert!(matches!(read_frame(&mut r, &mut buf, 32).unwrap(), Frame::Oversized));
        assert!(matches!(read_frame(&mut r, &mut buf, 32).unwrap(), Frame::Line));
        assert_eq!(buf, b"{\"type\":\"ping\"}\n");
        assert!(matches!(read_frame(&mut r, &mut buf, 32).unwrap(), Frame::Eof));
    }

    #[test]
    fn render_content_with_newlines_stays_on_one_line() {
        let render = RenderPayload { content: "one\ntwo\n\x1b[1mthree\x1b[0m".into(), total_lines: 3, ..Default::default() };
        let line = Message::new("c1", Body::Render(render.clone())).encode().unwrap();
        assert_eq!(line.matches('\n').count(), 1);
        assert_eq!(Message::decode(&line).unwrap().body, Body::Render(render));
    }
}
