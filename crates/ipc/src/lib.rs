//! QuillDesk IPC Protocol
//!
//! Shared types for renderer-host communication over stdio.
//!
//! Every message is one JSON object followed by `\n`. The renderer sends
//! [`DeskCommand`]s; the host answers each with exactly one [`DeskResponse`]
//! and may push [`DeskEvent`]s at any time (finished opens, alerts, editor
//! requests). Responses carry a `status` tag, events an `event` tag, so a
//! reader can tell them apart without extra framing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quilldesk_core_layout::{HitRegion, Point, TaskbarEntry, WindowId};

/// Maximum accepted size of one protocol line, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Errors raised while decoding a protocol line.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Message too large: {0} bytes (max {max})", max = MAX_MESSAGE_SIZE)]
    TooLarge(usize),

    #[error("Empty message")]
    Empty,

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Commands sent from the renderer to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeskCommand {
    /// Open (or focus) a chapter editor window.
    OpenChapter { chapter_id: String },
    /// Open (or focus) a codex entry window.
    OpenCodexEntry { entry_id: String },
    /// Open (or focus) the outline window.
    OpenOutline,
    /// Open (or focus) the codex index window.
    OpenCodex,

    Focus { window_id: WindowId },
    Minimize { window_id: WindowId },
    Restore { window_id: WindowId },
    Close { window_id: WindowId },
    /// Pan (and zoom out if needed) until the window is fully visible.
    ScrollIntoView { window_id: WindowId },

    /// Move a window to a canvas position (keyboard nudges, menus).
    MoveWindow { window_id: WindowId, x: f64, y: f64 },
    /// Resize a window; clamped to the minimum size.
    ResizeWindow { window_id: WindowId, width: f64, height: f64 },

    ZoomIn,
    ZoomOut,
    ZoomTo { level: f64 },
    /// Zoom while keeping a screen-space anchor fixed (scroll wheel).
    ZoomAt { level: f64, anchor: Point },
    /// Pan by a screen-space delta.
    Pan { dx: f64, dy: f64 },
    FitToView,
    Arrange,
    /// The visible area changed size.
    ResizeScreen { width: f64, height: f64 },

    /// Pointer went down on part of a window's chrome.
    PointerDown {
        window_id: WindowId,
        region: HitRegion,
        pointer: Point,
    },
    PointerMove { pointer: Point },
    PointerUp { pointer: Point },
    /// Pointer left the document mid-drag.
    PointerCancel,

    /// A codex entry drag started.
    LinkDragStart { format: String, data: String },
    LinkDragEnter { window_id: WindowId },
    LinkDragLeave { window_id: WindowId },
    /// Drop on a known window.
    LinkDrop { window_id: WindowId },
    /// Drop at a screen point; the target is resolved by z-order.
    LinkDropAt { pointer: Point },
    LinkDragEnd,

    /// Ask the editor in a window for its current selection.
    EditorSelection { window_id: WindowId },
    /// Replace a text range in a window's editor.
    EditorReplace {
        window_id: WindowId,
        from: usize,
        to: usize,
        text: String,
    },
    /// Ask the editor in a window for its serialized HTML.
    EditorSerialize { window_id: WindowId },
    /// Lock or unlock a window's editor.
    EditorSetEditable { window_id: WindowId, editable: bool },
    /// A reply from an editor to a request the host issued.
    EditorReply { message: EditorMessage },

    TaskbarList,
    TaskbarActivate { window_id: WindowId },

    /// Query the current layout.
    QueryLayout,
    /// Write the layout now instead of waiting for the debounce.
    Save,
    /// Reload configuration from file.
    Reload,
    /// Save and stop the host.
    Stop,
}

/// Geometry and state of one window as reported to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub title: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub z_index: u64,
    pub is_minimized: bool,
    pub is_active: bool,
    pub closable: bool,
    pub icon: String,
    /// Linked codex entry ids shown as tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Viewport transform as reported to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportInfo {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

/// Text selection reported by an editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSelection {
    pub from: usize,
    pub to: usize,
    pub text: String,
}

/// Responses from the host to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeskResponse {
    /// Command executed successfully.
    Ok,
    /// Command failed with an error.
    Error {
        /// Error message describing what went wrong.
        message: String,
    },
    /// Command had no effect (unknown id, rejected drop, no drag active).
    Ignored,
    /// Content is being fetched; a `window_opened` event follows on success.
    Pending { window_id: WindowId },
    /// Editor request sent; the reply arrives as an `editor_result` event.
    EditorPending { request_id: u64 },
    /// Current layout.
    Layout {
        windows: Vec<WindowInfo>,
        viewport: ViewportInfo,
        active: Option<WindowId>,
    },
    /// Live geometry during a drag.
    Geometry {
        window_id: WindowId,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// Whether a link drop target should be highlighted.
    Highlight { window_id: WindowId, highlighted: bool },
    /// Open-windows menu.
    Taskbar { entries: Vec<TaskbarEntry> },
}

impl DeskResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// `Ok` when the command changed something, `Ignored` otherwise.
    pub fn from_applied(applied: bool) -> Self {
        if applied {
            Self::Ok
        } else {
            Self::Ignored
        }
    }
}

/// Severity of an alert shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

/// Outcome of an editor request, pushed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditorResult {
    Selection { selection: Option<TextSelection> },
    Replaced { success: bool },
    Html { html: String },
    /// The editor did not answer in time or its window closed.
    Failed { message: String },
}

/// Unsolicited messages from the host to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeskEvent {
    /// A window finished opening; render it with this content.
    WindowOpened {
        window: WindowInfo,
        /// Serialized document body.
        body: String,
    },
    /// Show a message to the user.
    Alert { level: AlertLevel, message: String },
    /// A codex link was created by a drop.
    LinkCreated { window_id: WindowId, entry_id: String },
    /// A request for the editor inside a window.
    Editor { message: EditorMessage },
    /// Result of an `editor_*` command.
    EditorResult { request_id: u64, result: EditorResult },
    /// The layout was restored or rearranged and should be re-rendered.
    LayoutChanged,
}

impl DeskEvent {
    pub fn alert(level: AlertLevel, message: impl Into<String>) -> Self {
        Self::Alert {
            level,
            message: message.into(),
        }
    }
}

/// Typed messages exchanged with a window's editor.
///
/// Requests and their replies share a `request_id`; a reply whose id matches
/// no outstanding request is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorMessage {
    SelectionRequest { request_id: u64, window_id: WindowId },
    SelectionResponse {
        request_id: u64,
        selection: Option<TextSelection>,
    },
    ReplaceRangeCommand {
        request_id: u64,
        window_id: WindowId,
        from: usize,
        to: usize,
        text: String,
    },
    ReplacementCompleteEvent { request_id: u64, success: bool },
    SerializeRequest { request_id: u64, window_id: WindowId },
    SerializedHtml { request_id: u64, html: String },
    SetEditable {
        request_id: u64,
        window_id: WindowId,
        editable: bool,
    },
}

impl EditorMessage {
    pub fn request_id(&self) -> u64 {
        match self {
            EditorMessage::SelectionRequest { request_id, .. }
            | EditorMessage::SelectionResponse { request_id, .. }
            | EditorMessage::ReplaceRangeCommand { request_id, .. }
            | EditorMessage::ReplacementCompleteEvent { request_id, .. }
            | EditorMessage::SerializeRequest { request_id, .. }
            | EditorMessage::SerializedHtml { request_id, .. }
            | EditorMessage::SetEditable { request_id, .. } => *request_id,
        }
    }

    /// Replies travel from the editor to the host; everything else the other way.
    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            EditorMessage::SelectionResponse { .. }
                | EditorMessage::ReplacementCompleteEvent { .. }
                | EditorMessage::SerializedHtml { .. }
        )
    }
}

/// Decode one command line, enforcing [`MAX_MESSAGE_SIZE`].
pub fn decode_command(line: &str) -> Result<DeskCommand, ProtocolError> {
    if line.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(line.len()));
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Encode a message as one protocol line, newline included.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = DeskCommand::OpenChapter {
            chapter_id: "42".to_string(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"open_chapter\""));
        assert!(json.contains("\"chapter_id\":\"42\""));

        let cmd2: DeskCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, cmd2);
    }

    #[test]
    fn test_pointer_down_wire_format() {
        let json = r#"{"type":"pointer_down","window_id":"codex-entry-7","region":"title_bar","pointer":{"x":0.0,"y":0.0}}"#;
        let cmd = decode_command(json).unwrap();
        assert_eq!(
            cmd,
            DeskCommand::PointerDown {
                window_id: "codex-entry-7".to_string(),
                region: HitRegion::TitleBar,
                pointer: Point::new(0.0, 0.0),
            }
        );
    }

    #[test]
    fn test_response_serialization() {
        let resp = DeskResponse::Ok;
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"status":"ok"}"#);

        let resp = DeskResponse::Pending {
            window_id: "chapter-1".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"pending\""));
        let resp2: DeskResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, resp2);
    }

    #[test]
    fn test_layout_response_serialization() {
        let resp = DeskResponse::Layout {
            windows: vec![WindowInfo {
                id: "chapter-1".to_string(),
                title: "Chapter One".to_string(),
                x: 10.0,
                y: 20.0,
                width: 700.0,
                height: 500.0,
                z_index: 3,
                is_minimized: false,
                is_active: true,
                closable: true,
                icon: "chapter".to_string(),
                tags: vec!["7".to_string()],
            }],
            viewport: ViewportInfo {
                pan_x: 0.0,
                pan_y: 0.0,
                zoom: 1.0,
            },
            active: Some("chapter-1".to_string()),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"layout\""));
        assert!(json.contains("\"z_index\":3"));

        let resp2: DeskResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, resp2);
    }

    #[test]
    fn test_error_response() {
        let resp = DeskResponse::error("Something went wrong");
        if let DeskResponse::Error { message } = resp {
            assert_eq!(message, "Something went wrong");
        } else {
            panic!("Expected Error response");
        }
        assert_eq!(DeskResponse::from_applied(false), DeskResponse::Ignored);
    }

    #[test]
    fn test_event_serialization() {
        let event = DeskEvent::alert(AlertLevel::Error, "Chapter not found");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"alert\""));
        assert!(json.contains("\"level\":\"error\""));

        let event = DeskEvent::Editor {
            message: EditorMessage::SerializeRequest {
                request_id: 4,
                window_id: "chapter-1".to_string(),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"editor\""));
        assert!(json.contains("\"type\":\"serialize_request\""));
        let event2: DeskEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, event2);
    }

    #[test]
    fn test_editor_message_request_ids() {
        let reply = EditorMessage::SelectionResponse {
            request_id: 9,
            selection: Some(TextSelection {
                from: 1,
                to: 5,
                text: "word".to_string(),
            }),
        };
        assert_eq!(reply.request_id(), 9);
        assert!(reply.is_reply());

        let request = EditorMessage::SetEditable {
            request_id: 2,
            window_id: "chapter-1".to_string(),
            editable: false,
        };
        assert_eq!(request.request_id(), 2);
        assert!(!request.is_reply());
    }

    #[test]
    fn test_editor_reply_command() {
        let json = r#"{"type":"editor_reply","message":{"type":"serialized_html","request_id":3,"html":"<p>x</p>"}}"#;
        let cmd = decode_command(json).unwrap();
        assert_eq!(
            cmd,
            DeskCommand::EditorReply {
                message: EditorMessage::SerializedHtml {
                    request_id: 3,
                    html: "<p>x</p>".to_string(),
                },
            }
        );
    }

    #[test]
    fn test_line_delimited_protocol() {
        let cmd = DeskCommand::QueryLayout;
        let wire_format = encode_line(&cmd).unwrap();
        assert!(wire_format.ends_with('\n'));

        let parsed = decode_command(&wire_format).unwrap();
        assert_eq!(cmd, parsed);
    }

    #[test]
    fn test_invalid_json_handling() {
        assert!(matches!(decode_command("not valid json"), Err(ProtocolError::Json(_))));
        assert!(matches!(
            decode_command("{\"type\": \"unknown_command\"}"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(decode_command("   \n"), Err(ProtocolError::Empty)));

        let result: Result<DeskResponse, _> = serde_json::from_str("{\"status\": \"invalid\"}");
        assert!(result.is_err());
    }

    #[test]
    fn test_oversized_message_rejected() {
        let line = format!(
            "{{\"type\":\"open_chapter\",\"chapter_id\":\"{}\"}}",
            "x".repeat(MAX_MESSAGE_SIZE)
        );
        assert!(matches!(decode_command(&line), Err(ProtocolError::TooLarge(_))));
    }
}
