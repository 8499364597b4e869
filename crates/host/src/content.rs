//! Content backend seam.
//!
//! The window manager never reads documents itself; it asks a
//! [`ContentProvider`] and stores the returned [`ContentHandle`].
//!
//! [`DirectoryProvider`] serves a novel laid out on disk as:
//!
//! ```text
//! <root>/<novel_id>/chapters/<chapter_id>.json
//! <root>/<novel_id>/codex/<entry_id>.json
//! ```
//!
//! where each document is `{"title": ..., "body": ..., "links": [...]}`.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quilldesk_core_layout::{ContentHandle, ContentRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from the content backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Content backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn chapter_content(&self, chapter_id: &str) -> Result<ContentHandle, ContentError>;

    async fn codex_entry_content(&self, entry_id: &str) -> Result<ContentHandle, ContentError>;

    /// The novel's outline: its chapters in order.
    async fn outline_snapshot(&self, novel_id: &str) -> Result<ContentHandle, ContentError>;

    /// Index of all codex entries.
    async fn codex_index(&self, novel_id: &str) -> Result<ContentHandle, ContentError>;

    /// Link a codex entry to a chapter or another entry.
    async fn create_link(&self, target: &ContentRef, entry_id: &str) -> Result<(), ContentError>;
}

/// Fetch whatever `content` refers to.
pub async fn fetch(
    provider: &dyn ContentProvider,
    novel_id: &str,
    content: &ContentRef,
) -> Result<ContentHandle, ContentError> {
    match content {
        ContentRef::Outline => provider.outline_snapshot(novel_id).await,
        ContentRef::CodexIndex => provider.codex_index(novel_id).await,
        ContentRef::Chapter { chapter_id } => provider.chapter_content(chapter_id).await,
        ContentRef::CodexEntry { entry_id } => provider.codex_entry_content(entry_id).await,
    }
}

/// On-disk document format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredDocument {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub links: Vec<String>,
}

/// Serves one novel from a directory tree using `tokio::fs`.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
    novel_id: String,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>, novel_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            novel_id: novel_id.into(),
        }
    }

    pub fn novel_dir(&self, novel_id: &str) -> Result<PathBuf, ContentError> {
        check_id(novel_id)?;
        Ok(self.root.join(novel_id))
    }

    fn chapters_dir(&self) -> Result<PathBuf, ContentError> {
        Ok(self.novel_dir(&self.novel_id)?.join("chapters"))
    }

    fn codex_dir(&self) -> Result<PathBuf, ContentError> {
        Ok(self.novel_dir(&self.novel_id)?.join("codex"))
    }

    fn document_path(&self, content: &ContentRef) -> Result<PathBuf, ContentError> {
        match content {
            ContentRef::Chapter { chapter_id } => {
                check_id(chapter_id)?;
                Ok(self.chapters_dir()?.join(format!("{chapter_id}.json")))
            }
            ContentRef::CodexEntry { entry_id } => {
                check_id(entry_id)?;
                Ok(self.codex_dir()?.join(format!("{entry_id}.json")))
            }
            ContentRef::Outline | ContentRef::CodexIndex => Err(ContentError::Backend(format!(
                "{} is not a stored document",
                content.window_id()
            ))),
        }
    }

    async fn read_document(&self, content: &ContentRef) -> Result<StoredDocument, ContentError> {
        let path = self.document_path(content)?;
        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error(e, &content.window_id()))?;
        serde_json::from_str(&json)
            .map_err(|e| ContentError::Backend(format!("{}: {}", path.display(), e)))
    }

    async fn document(&self, content: ContentRef) -> Result<ContentHandle, ContentError> {
        let doc = self.read_document(&content).await?;
        debug!("Loaded {} ({} bytes)", content.window_id(), doc.body.len());
        Ok(ContentHandle {
            source: content,
            title: doc.title,
            body: doc.body,
            links: doc.links,
        })
    }

    /// `(id, title)` for every document in a directory, sorted by id.
    async fn list_documents(dir: &Path) -> Result<Vec<(String, String)>, ContentError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ContentError::Backend(e.to_string())),
        };

        let mut docs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ContentError::Backend(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let title = match tokio::fs::read_to_string(&path).await {
                Ok(json) => serde_json::from_str::<StoredDocument>(&json)
                    .map(|d| d.title)
                    .unwrap_or_else(|_| id.clone()),
                Err(_) => id.clone(),
            };
            docs.push((id, title));
        }
        docs.sort_by(|a, b| natural_key(&a.0).cmp(&natural_key(&b.0)));
        Ok(docs)
    }
}

#[async_trait]
impl ContentProvider for DirectoryProvider {
    async fn chapter_content(&self, chapter_id: &str) -> Result<ContentHandle, ContentError> {
        self.document(ContentRef::Chapter {
            chapter_id: chapter_id.to_string(),
        })
        .await
    }

    async fn codex_entry_content(&self, entry_id: &str) -> Result<ContentHandle, ContentError> {
        self.document(ContentRef::CodexEntry {
            entry_id: entry_id.to_string(),
        })
        .await
    }

    async fn outline_snapshot(&self, novel_id: &str) -> Result<ContentHandle, ContentError> {
        let dir = self.novel_dir(novel_id)?;
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(ContentError::NotFound(format!("novel {novel_id}")));
        }
        let chapters = Self::list_documents(&dir.join("chapters")).await?;
        Ok(ContentHandle {
            source: ContentRef::Outline,
            title: "Outline".to_string(),
            body: render_list("outline", "chapter", &chapters),
            links: Vec::new(),
        })
    }

    async fn codex_index(&self, novel_id: &str) -> Result<ContentHandle, ContentError> {
        let dir = self.novel_dir(novel_id)?;
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(ContentError::NotFound(format!("novel {novel_id}")));
        }
        let entries = Self::list_documents(&dir.join("codex")).await?;
        Ok(ContentHandle {
            source: ContentRef::CodexIndex,
            title: "Codex".to_string(),
            body: render_list("codex", "codex-entry", &entries),
            links: Vec::new(),
        })
    }

    async fn create_link(&self, target: &ContentRef, entry_id: &str) -> Result<(), ContentError> {
        check_id(entry_id)?;
        let linked = ContentRef::CodexEntry {
            entry_id: entry_id.to_string(),
        };
        let entry_path = self.document_path(&linked)?;
        if !tokio::fs::try_exists(&entry_path).await.unwrap_or(false) {
            return Err(ContentError::NotFound(linked.window_id()));
        }

        let mut doc = self.read_document(target).await?;
        if doc.links.iter().any(|l| l == entry_id) {
            return Ok(());
        }
        doc.links.push(entry_id.to_string());

        let path = self.document_path(target)?;
        let json = serde_json::to_string_pretty(&doc).map_err(|e| ContentError::Backend(e.to_string()))?;
        write_atomic(&path, json.as_bytes())
            .await
            .map_err(|e| io_error(e, &target.window_id()))?;
        debug!("Linked codex entry {} to {}", entry_id, target.window_id());
        Ok(())
    }
}

/// Write through a temp file so a crash never leaves a truncated document.
async fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, data).await?;
    tokio::fs::rename(&tmp_path, path).await
}

fn check_id(id: &str) -> Result<(), ContentError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ContentError::NotFound(id.to_string()))
    }
}

fn io_error(e: io::Error, what: &str) -> ContentError {
    if e.kind() == io::ErrorKind::NotFound {
        ContentError::NotFound(what.to_string())
    } else {
        ContentError::Backend(format!("{what}: {e}"))
    }
}

/// Sort ids numerically when they are numbers, so chapter 10 follows chapter 9.
fn natural_key(id: &str) -> (u64, String) {
    (id.parse::<u64>().unwrap_or(u64::MAX), id.to_string())
}

fn render_list(class: &str, kind: &str, items: &[(String, String)]) -> String {
    let mut html = format!("<ul class=\"{class}\">");
    for (id, title) in items {
        html.push_str(&format!(
            "<li data-{kind}=\"{}\">{}</li>",
            escape_html(id),
            escape_html(title)
        ));
    }
    html.push_str("</ul>");
    html
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    /// A novel `n1` with chapters 1, 2 and 10 and codex entries 7 and 9.
    pub(crate) fn sample_novel() -> TempDir {
        let dir = tempdir().unwrap();
        let novel = dir.path().join("n1");
        std::fs::create_dir_all(novel.join("chapters")).unwrap();
        std::fs::create_dir_all(novel.join("codex")).unwrap();

        for (id, title) in [("1", "Arrival"), ("2", "The <Storm>"), ("10", "Departure")] {
            let doc = StoredDocument {
                title: title.to_string(),
                body: format!("<p>chapter {id}</p>"),
                links: if id == "1" { vec!["7".to_string()] } else { Vec::new() },
            };
            std::fs::write(
                novel.join("chapters").join(format!("{id}.json")),
                serde_json::to_string(&doc).unwrap(),
            )
            .unwrap();
        }
        for (id, title) in [("7", "Lighthouse"), ("9", "Captain Ames")] {
            let doc = StoredDocument {
                title: title.to_string(),
                body: format!("<p>entry {id}</p>"),
                links: Vec::new(),
            };
            std::fs::write(
                novel.join("codex").join(format!("{id}.json")),
                serde_json::to_string(&doc).unwrap(),
            )
            .unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_chapter_content() {
        let dir = sample_novel();
        let provider = DirectoryProvider::new(dir.path(), "n1");

        let chapter = provider.chapter_content("1").await.unwrap();
        assert_eq!(chapter.title, "Arrival");
        assert_eq!(chapter.links, vec!["7"]);
        assert_eq!(
            chapter.source,
            ContentRef::Chapter {
                chapter_id: "1".to_string()
            }
        );

        assert_eq!(
            provider.chapter_content("99").await,
            Err(ContentError::NotFound("chapter-99".to_string()))
        );
        assert!(matches!(
            provider.chapter_content("../../etc/passwd").await,
            Err(ContentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_document_is_backend_error() {
        let dir = sample_novel();
        std::fs::write(dir.path().join("n1/codex/bad.json"), "not json").unwrap();
        let provider = DirectoryProvider::new(dir.path(), "n1");
        assert!(matches!(
            provider.codex_entry_content("bad").await,
            Err(ContentError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_outline_lists_chapters_in_order() {
        let dir = sample_novel();
        let provider = DirectoryProvider::new(dir.path(), "n1");

        let outline = provider.outline_snapshot("n1").await.unwrap();
        assert_eq!(outline.source, ContentRef::Outline);
        let first = outline.body.find("Arrival").unwrap();
        let second = outline.body.find("The &lt;Storm&gt;").unwrap();
        let last = outline.body.find("Departure").unwrap();
        assert!(first < second && second < last);

        assert!(matches!(
            provider.outline_snapshot("missing").await,
            Err(ContentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_codex_index() {
        let dir = sample_novel();
        let provider = DirectoryProvider::new(dir.path(), "n1");
        let index = fetch(&provider, "n1", &ContentRef::CodexIndex).await.unwrap();
        assert!(index.body.contains("data-codex-entry=\"7\""));
        assert!(index.body.contains("Captain Ames"));
    }

    #[tokio::test]
    async fn test_create_link_appends_once() {
        let dir = sample_novel();
        let provider = DirectoryProvider::new(dir.path(), "n1");
        let target = ContentRef::Chapter {
            chapter_id: "2".to_string(),
        };

        provider.create_link(&target, "9").await.unwrap();
        provider.create_link(&target, "9").await.unwrap();
        let chapter = provider.chapter_content("2").await.unwrap();
        assert_eq!(chapter.links, vec!["9"]);

        assert!(matches!(
            provider.create_link(&target, "404").await,
            Err(ContentError::NotFound(_))
        ));
        assert!(matches!(
            provider.create_link(&ContentRef::Outline, "9").await,
            Err(ContentError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_create_link_leaves_no_temp_file() {
        let dir = sample_novel();
        let provider = DirectoryProvider::new(dir.path(), "n1");
        let target = ContentRef::CodexEntry {
            entry_id: "7".to_string(),
        };
        provider.create_link(&target, "9").await.unwrap();

        let codex = dir.path().join("n1").join("codex");
        assert!(!codex.join("7.json.tmp").exists());
        let names: Vec<String> = std::fs::read_dir(&codex)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| n.ends_with(".json")));

        let entry = provider.codex_entry_content("7").await.unwrap();
        assert_eq!(entry.links, vec!["9"]);
        assert_eq!(entry.title, "Lighthouse");
    }
}
