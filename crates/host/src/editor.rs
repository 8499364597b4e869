//! Request/reply bridge to the editors inside windows.
//!
//! The host sends [`EditorMessage`] requests out as events and waits for the
//! matching reply on a one-shot channel keyed by request id.

use std::collections::HashMap;

use quilldesk_core_layout::WindowId;
use quilldesk_ipc::{EditorMessage, EditorResult};
use tokio::sync::oneshot;
use tracing::debug;

/// The reply a request is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    Selection,
    Replacement,
    Html,
}

impl ReplyKind {
    /// Reply kind a request expects; `None` for messages that get no reply.
    fn expected_by(request: &EditorMessage) -> Option<Self> {
        match request {
            EditorMessage::SelectionRequest { .. } => Some(ReplyKind::Selection),
            EditorMessage::ReplaceRangeCommand { .. } => Some(ReplyKind::Replacement),
            EditorMessage::SerializeRequest { .. } => Some(ReplyKind::Html),
            _ => None,
        }
    }

    /// Kind of a reply message; `None` for requests.
    fn of_reply(reply: &EditorMessage) -> Option<Self> {
        match reply {
            EditorMessage::SelectionResponse { .. } => Some(ReplyKind::Selection),
            EditorMessage::ReplacementCompleteEvent { .. } => Some(ReplyKind::Replacement),
            EditorMessage::SerializedHtml { .. } => Some(ReplyKind::Html),
            _ => None,
        }
    }
}

/// An outstanding request.
struct PendingRequest {
    window_id: WindowId,
    expects: Option<ReplyKind>,
    reply: oneshot::Sender<EditorMessage>,
}

/// Correlates editor replies with the requests that caused them.
#[derive(Default)]
pub struct EditorBridge {
    next_request_id: u64,
    pending: HashMap<u64, PendingRequest>,
}

/// A request ready to send, plus the receiver for its reply.
pub struct IssuedRequest {
    pub request_id: u64,
    pub message: EditorMessage,
    pub reply: oneshot::Receiver<EditorMessage>,
}

impl EditorBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self, window_id: &str, build: impl FnOnce(u64) -> EditorMessage) -> IssuedRequest {
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let (tx, rx) = oneshot::channel();
        let message = build(request_id);
        self.pending.insert(
            request_id,
            PendingRequest {
                window_id: window_id.to_string(),
                expects: ReplyKind::expected_by(&message),
                reply: tx,
            },
        );
        IssuedRequest {
            request_id,
            message,
            reply: rx,
        }
    }

    pub fn request_selection(&mut self, window_id: &str) -> IssuedRequest {
        self.issue(window_id, |request_id| EditorMessage::SelectionRequest {
            request_id,
            window_id: window_id.to_string(),
        })
    }

    pub fn replace_range(&mut self, window_id: &str, from: usize, to: usize, text: String) -> IssuedRequest {
        self.issue(window_id, |request_id| EditorMessage::ReplaceRangeCommand {
            request_id,
            window_id: window_id.to_string(),
            from,
            to,
            text,
        })
    }

    pub fn request_html(&mut self, window_id: &str) -> IssuedRequest {
        self.issue(window_id, |request_id| EditorMessage::SerializeRequest {
            request_id,
            window_id: window_id.to_string(),
        })
    }

    /// Toggle editability. Fire-and-forget: editors do not acknowledge it.
    pub fn set_editable(&mut self, window_id: &str, editable: bool) -> EditorMessage {
        self.next_request_id += 1;
        EditorMessage::SetEditable {
            request_id: self.next_request_id,
            window_id: window_id.to_string(),
            editable,
        }
    }

    /// Route a reply to its waiting request.
    ///
    /// Returns false when the id is unknown (already answered, timed out,
    /// or never issued), the message is not a reply, or it is the wrong kind
    /// of reply for the request. Such messages are dropped and a mismatched
    /// request stays pending.
    pub fn resolve(&mut self, message: EditorMessage) -> bool {
        let Some(kind) = ReplyKind::of_reply(&message) else {
            return false;
        };
        let request_id = message.request_id();
        let Some(pending) = self.pending.get(&request_id) else {
            debug!("Dropping editor reply for unknown request {}", request_id);
            return false;
        };
        if pending.expects != Some(kind) {
            debug!(
                "Dropping {:?} reply for request {}, expected {:?}",
                kind, request_id, pending.expects
            );
            return false;
        }
        match self.pending.remove(&request_id) {
            Some(pending) => pending.reply.send(message).is_ok(),
            None => false,
        }
    }

    /// Drop a request that timed out.
    pub fn forget(&mut self, request_id: u64) {
        self.pending.remove(&request_id);
    }

    /// Fail every request aimed at a window that went away.
    pub fn window_closed(&mut self, window_id: &str) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, p| p.window_id != window_id);
        before - self.pending.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Turn an editor reply into the result reported to the renderer.
pub fn reply_to_result(reply: EditorMessage) -> EditorResult {
    match reply {
        EditorMessage::SelectionResponse { selection, .. } => EditorResult::Selection { selection },
        EditorMessage::ReplacementCompleteEvent { success, .. } => EditorResult::Replaced { success },
        EditorMessage::SerializedHtml { html, .. } => EditorResult::Html { html },
        other => EditorResult::Failed {
            message: format!("unexpected editor reply: {other:?}"),
        },
    }
}
