//! Window records and the content they carry.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size};

/// Unique identifier for a window.
///
/// Ids are stable string keys derived from the content they show, e.g.
/// `chapter-42`, `codex-entry-7` or `outline-window`.
pub type WindowId = String;

/// Id of the permanent outline window.
pub const OUTLINE_WINDOW_ID: &str = "outline-window";
/// Id of the permanent codex index window.
pub const CODEX_WINDOW_ID: &str = "codex-window";

const CHAPTER_PREFIX: &str = "chapter-";
const CODEX_ENTRY_PREFIX: &str = "codex-entry-";

/// What a window shows, recoverable from its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentRef {
    Outline,
    CodexIndex,
    Chapter { chapter_id: String },
    CodexEntry { entry_id: String },
}

impl ContentRef {
    /// The window id that shows this content.
    pub fn window_id(&self) -> WindowId {
        match self {
            ContentRef::Outline => OUTLINE_WINDOW_ID.to_string(),
            ContentRef::CodexIndex => CODEX_WINDOW_ID.to_string(),
            ContentRef::Chapter { chapter_id } => format!("{CHAPTER_PREFIX}{chapter_id}"),
            ContentRef::CodexEntry { entry_id } => format!("{CODEX_ENTRY_PREFIX}{entry_id}"),
        }
    }

    /// Recover the content reference from a window id.
    ///
    /// Returns `None` for ids that do not follow a known scheme.
    pub fn from_window_id(id: &str) -> Option<Self> {
        if id == OUTLINE_WINDOW_ID {
            return Some(ContentRef::Outline);
        }
        if id == CODEX_WINDOW_ID {
            return Some(ContentRef::CodexIndex);
        }
        // codex-entry- has to be checked before any shorter prefix could match
        if let Some(entry_id) = id.strip_prefix(CODEX_ENTRY_PREFIX) {
            return (!entry_id.is_empty()).then(|| ContentRef::CodexEntry {
                entry_id: entry_id.to_string(),
            });
        }
        if let Some(chapter_id) = id.strip_prefix(CHAPTER_PREFIX) {
            return (!chapter_id.is_empty()).then(|| ContentRef::Chapter {
                chapter_id: chapter_id.to_string(),
            });
        }
        None
    }

    /// Permanent windows cannot be closed by the user.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ContentRef::Outline | ContentRef::CodexIndex)
    }
}

/// Body of a window as delivered by the content backend.
///
/// The manager stores it and hands it back; it never looks inside `body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentHandle {
    pub source: ContentRef,
    pub title: String,
    /// Serialized document body (HTML for editor windows).
    pub body: String,
    /// Codex entry ids already linked to this content.
    #[serde(default)]
    pub links: Vec<String>,
}

/// Request to open a window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub id: WindowId,
    pub title: String,
    pub content: Option<ContentHandle>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub icon: String,
    pub closable: bool,
}

impl WindowSpec {
    /// A closable window with no content attached.
    pub fn new(id: impl Into<WindowId>, title: impl Into<String>, rect: Rect) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: None,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            icon: String::new(),
            closable: true,
        }
    }

    pub fn with_content(mut self, content: ContentHandle) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn closable(mut self, closable: bool) -> Self {
        self.closable = closable;
        self
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// One open panel on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRecord {
    pub id: WindowId,
    pub title: String,
    pub position: Point,
    pub size: Size,
    pub z_index: u64,
    pub is_minimized: bool,
    pub closable: bool,
    pub icon: String,
    pub content: Option<ContentHandle>,
}

impl WindowRecord {
    /// The window's bounding box in canvas coordinates.
    pub fn rect(&self) -> Rect {
        Rect::from_parts(self.position, self.size)
    }
}
