//! Drag-and-drop linking of codex entries onto windows.
//!
//! Runs alongside the pointer drag machine. A drag carries a typed payload;
//! drop zones highlight only when they accept the payload kind, and a drop
//! yields a [`LinkRequest`] only when the target accepts the payload and is
//! not linked to it yet. Anything else is ignored without feedback.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::window::{ContentRef, WindowId};

/// MIME-style format string used on the platform drag channel.
pub const CODEX_ENTRY_FORMAT: &str = "application/x-quilldesk-codex-entry";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    CodexEntry,
}

impl PayloadKind {
    pub fn format(&self) -> &'static str {
        match self {
            PayloadKind::CodexEntry => CODEX_ENTRY_FORMAT,
        }
    }

    pub fn from_format(format: &str) -> Option<Self> {
        match format {
            CODEX_ENTRY_FORMAT => Some(PayloadKind::CodexEntry),
            _ => None,
        }
    }
}

/// Data carried by a link drag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPayload {
    pub kind: PayloadKind,
    pub entry_id: String,
}

impl LinkPayload {
    pub fn codex_entry(entry_id: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::CodexEntry,
            entry_id: entry_id.into(),
        }
    }

    /// `(format, data)` pair for the platform drag channel.
    pub fn encode(&self) -> (&'static str, String) {
        (self.kind.format(), self.entry_id.clone())
    }

    /// Rebuild a payload from the platform drag channel.
    pub fn decode(format: &str, data: &str) -> Option<Self> {
        let kind = PayloadKind::from_format(format)?;
        let entry_id = data.trim();
        if entry_id.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            entry_id: entry_id.to_string(),
        })
    }
}

/// A window that can receive drops, with its visible tag list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DropZone {
    pub accepts: Vec<PayloadKind>,
    /// Linked entry ids in the order they were linked.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DropZones {
    zones: HashMap<WindowId, DropZone>,
}

impl DropZones {
    pub fn new() -> Self {
        Self::default()
    }

    /// Which payloads a window showing `content` accepts.
    pub fn accepted_kinds(content: &ContentRef) -> Vec<PayloadKind> {
        match content {
            ContentRef::Chapter { .. } | ContentRef::CodexEntry { .. } => vec![PayloadKind::CodexEntry],
            ContentRef::Outline | ContentRef::CodexIndex => Vec::new(),
        }
    }

    /// Register (or replace) a window's drop zone.
    pub fn register(&mut self, window_id: impl Into<WindowId>, accepts: Vec<PayloadKind>, tags: Vec<String>) {
        let mut unique: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        self.zones.insert(window_id.into(), DropZone { accepts, tags: unique });
    }

    pub fn remove(&mut self, window_id: &str) -> Option<DropZone> {
        self.zones.remove(window_id)
    }

    pub fn get(&self, window_id: &str) -> Option<&DropZone> {
        self.zones.get(window_id)
    }

    pub fn tags(&self, window_id: &str) -> &[String] {
        self.zones.get(window_id).map(|z| z.tags.as_slice()).unwrap_or(&[])
    }

    pub fn accepts(&self, window_id: &str, kind: PayloadKind) -> bool {
        self.zones
            .get(window_id)
            .is_some_and(|z| z.accepts.contains(&kind))
    }

    pub fn is_linked(&self, window_id: &str, entry_id: &str) -> bool {
        self.zones
            .get(window_id)
            .is_some_and(|z| z.tags.iter().any(|t| t == entry_id))
    }

    /// Whether dropping `payload` on `window_id` would create a new link.
    pub fn can_accept(&self, window_id: &str, payload: &LinkPayload) -> bool {
        let self_link = ContentRef::from_window_id(window_id)
            == Some(ContentRef::CodexEntry {
                entry_id: payload.entry_id.clone(),
            });
        self.accepts(window_id, payload.kind) && !self_link && !self.is_linked(window_id, &payload.entry_id)
    }

    /// Record a created link. Returns false for unknown zones or duplicates.
    pub fn add_tag(&mut self, window_id: &str, entry_id: &str) -> bool {
        match self.zones.get_mut(window_id) {
            Some(zone) if !zone.tags.iter().any(|t| t == entry_id) => {
                zone.tags.push(entry_id.to_string());
                true
            }
            _ => false,
        }
    }
}

/// A validated drop; the caller performs the link side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub target: WindowId,
    pub payload: LinkPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkDragState {
    #[default]
    Idle,
    Carrying {
        payload: LinkPayload,
        highlighted: Option<WindowId>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct LinkDrag {
    state: LinkDragState,
}

impl LinkDrag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &LinkDragState {
        &self.state
    }

    pub fn payload(&self) -> Option<&LinkPayload> {
        match &self.state {
            LinkDragState::Carrying { payload, .. } => Some(payload),
            LinkDragState::Idle => None,
        }
    }

    /// Zone currently showing the drop highlight.
    pub fn highlighted(&self) -> Option<&str> {
        match &self.state {
            LinkDragState::Carrying { highlighted, .. } => highlighted.as_deref(),
            LinkDragState::Idle => None,
        }
    }

    /// Begin carrying a payload. Replaces any earlier, unfinished drag.
    pub fn drag_start(&mut self, payload: LinkPayload) {
        self.state = LinkDragState::Carrying {
            payload,
            highlighted: None,
        };
    }

    /// Pointer entered a window. Returns true if it should be highlighted.
    pub fn drag_enter(&mut self, zones: &DropZones, target: &str) -> bool {
        let LinkDragState::Carrying { payload, highlighted } = &mut self.state else {
            return false;
        };
        if zones.accepts(target, payload.kind) {
            *highlighted = Some(target.to_string());
            true
        } else {
            false
        }
    }

    /// Pointer left a window. Returns true if a highlight was cleared.
    pub fn drag_leave(&mut self, target: &str) -> bool {
        match &mut self.state {
            LinkDragState::Carrying { highlighted, .. } if highlighted.as_deref() == Some(target) => {
                *highlighted = None;
                true
            }
            _ => false,
        }
    }

    /// Drop on `target`. The drag ends either way.
    pub fn drop_on(&mut self, zones: &DropZones, target: &str) -> Option<LinkRequest> {
        let LinkDragState::Carrying { payload, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        zones.can_accept(target, &payload).then(|| LinkRequest {
            target: target.to_string(),
            payload,
        })
    }

    /// The drag ended without a drop.
    pub fn drag_end(&mut self) {
        self.state = LinkDragState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> DropZones {
        let mut zones = DropZones::new();
        zones.register("chapter-1", vec![PayloadKind::CodexEntry], vec!["3".to_string()]);
        zones.register("codex-entry-7", vec![PayloadKind::CodexEntry], Vec::new());
        zones.register("outline-window", Vec::new(), Vec::new());
        zones
    }

    #[test]
    fn test_payload_encoding() {
        let payload = LinkPayload::codex_entry("42");
        let (format, data) = payload.encode();
        assert_eq!(format, CODEX_ENTRY_FORMAT);
        assert_eq!(LinkPayload::decode(format, &data), Some(payload));
        assert_eq!(LinkPayload::decode("text/plain", "42"), None);
        assert_eq!(LinkPayload::decode(CODEX_ENTRY_FORMAT, "  "), None);
    }

    #[test]
    fn test_highlight_only_valid_zones() {
        let zones = zones();
        let mut drag = LinkDrag::new();
        assert!(!drag.drag_enter(&zones, "chapter-1"));

        drag.drag_start(LinkPayload::codex_entry("9"));
        assert!(drag.drag_enter(&zones, "chapter-1"));
        assert_eq!(drag.highlighted(), Some("chapter-1"));

        assert!(!drag.drag_enter(&zones, "outline-window"));
        assert_eq!(drag.highlighted(), Some("chapter-1"));

        assert!(!drag.drag_leave("outline-window"));
        assert!(drag.drag_leave("chapter-1"));
        assert_eq!(drag.highlighted(), None);
    }

    #[test]
    fn test_drop_creates_request() {
        let zones = zones();
        let mut drag = LinkDrag::new();
        drag.drag_start(LinkPayload::codex_entry("9"));
        let request = drag.drop_on(&zones, "chapter-1").expect("valid drop");
        assert_eq!(request.target, "chapter-1");
        assert_eq!(request.payload.entry_id, "9");
        assert_eq!(*drag.state(), LinkDragState::Idle);
    }

    #[test]
    fn test_drop_rejects_duplicates_mismatch_and_self_links() {
        let zones = zones();
        let mut drag = LinkDrag::new();

        drag.drag_start(LinkPayload::codex_entry("3"));
        assert!(drag.drop_on(&zones, "chapter-1").is_none());

        drag.drag_start(LinkPayload::codex_entry("9"));
        assert!(drag.drop_on(&zones, "outline-window").is_none());

        drag.drag_start(LinkPayload::codex_entry("7"));
        assert!(drag.drop_on(&zones, "codex-entry-7").is_none());

        drag.drag_start(LinkPayload::codex_entry("9"));
        assert!(drag.drop_on(&zones, "unknown").is_none());

        assert!(drag.drop_on(&zones, "chapter-1").is_none());
    }

    #[test]
    fn test_add_tag() {
        let mut zones = zones();
        assert!(zones.add_tag("chapter-1", "9"));
        assert!(!zones.add_tag("chapter-1", "9"));
        assert!(!zones.add_tag("missing", "9"));
        assert_eq!(zones.tags("chapter-1"), ["3".to_string(), "9".to_string()]);
        assert!(zones.tags("missing").is_empty());
    }

    #[test]
    fn test_register_dedups_tags() {
        let mut zones = DropZones::new();
        zones.register(
            "chapter-2",
            vec![PayloadKind::CodexEntry],
            vec!["1".to_string(), "1".to_string(), "2".to_string()],
        );
        assert_eq!(zones.tags("chapter-2").len(), 2);
    }
}
