//! One editing session: a novel, its window manager and its collaborators.
//!
//! All state lives in [`Session`] and is only touched from the event loop.
//! Anything slow (content fetches, link creation, editor round trips) runs
//! in a spawned task that reports back with a [`HostEvent`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use quilldesk_core_layout::{
    ContentHandle, ContentRef, LayoutError, LinkPayload, LinkRequest, OpenRequest, OpenResolution,
    OpenTicket, PersistedWindow, Point, Rect, Size, TaskbarAction, WindowManager,
    WindowRecord, WindowSpec,
};
use quilldesk_ipc::{
    AlertLevel, DeskCommand, DeskEvent, DeskResponse, EditorResult, ViewportInfo, WindowInfo,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::{self, CompiledWindowRule, Config};
use crate::content::{self, ContentError, ContentProvider};
use crate::editor::{self, EditorBridge, IssuedRequest};
use crate::persistence::{self, LayoutStore, StoreError};

/// Events processed by the host event loop.
pub enum HostEvent {
    /// A command from the renderer.
    Command {
        cmd: DeskCommand,
        responder: oneshot::Sender<DeskResponse>,
    },
    /// A content fetch for an open finished.
    ContentLoaded {
        ticket: OpenTicket,
        result: Result<ContentHandle, ContentError>,
    },
    /// Content for one window of the saved layout finished loading.
    WindowRestored {
        saved: PersistedWindow,
        result: Result<ContentHandle, ContentError>,
    },
    /// The backend finished creating a link.
    LinkFinished {
        request: LinkRequest,
        result: Result<(), ContentError>,
    },
    /// An editor did not answer in time.
    EditorTimedOut { request_id: u64 },
    /// Shutdown signal.
    Shutdown,
}

/// Whether the event loop should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Session {
    novel_id: String,
    config: Config,
    config_path: Option<PathBuf>,
    rules: Vec<CompiledWindowRule>,
    manager: WindowManager,
    provider: Arc<dyn ContentProvider>,
    store: Box<dyn LayoutStore>,
    editor: EditorBridge,
    /// Loop-back channel for spawned tasks.
    events: mpsc::Sender<HostEvent>,
    /// Events pushed to the renderer.
    outbound: mpsc::UnboundedSender<DeskEvent>,
    saved_revision: u64,
    seen_revision: u64,
    /// Saved windows whose content is still loading.
    restoring: Vec<PersistedWindow>,
}

impl Session {
    pub fn new(
        novel_id: impl Into<String>,
        config: Config,
        provider: Arc<dyn ContentProvider>,
        store: Box<dyn LayoutStore>,
        events: mpsc::Sender<HostEvent>,
        outbound: mpsc::UnboundedSender<DeskEvent>,
    ) -> Result<Self, LayoutError> {
        let manager = WindowManager::new(config.manager_settings())?;
        let rules = config.compile_window_rules();
        let revision = manager.revision();
        Ok(Self {
            novel_id: novel_id.into(),
            config,
            config_path: None,
            rules,
            manager,
            provider,
            store,
            editor: EditorBridge::new(),
            events,
            outbound,
            saved_revision: revision,
            seen_revision: revision,
            restoring: Vec::new(),
        })
    }

    /// Reload configuration from this file instead of the standard locations.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn novel_id(&self) -> &str {
        &self.novel_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manager(&self) -> &WindowManager {
        &self.manager
    }

    pub fn store(&self) -> &dyn LayoutStore {
        self.store.as_ref()
    }

    pub fn editor(&self) -> &EditorBridge {
        &self.editor
    }

    fn emit(&self, event: DeskEvent) {
        if self.outbound.send(event).is_err() {
            debug!("Renderer channel closed, dropping event");
        }
    }

    fn alert(&self, level: AlertLevel, message: impl Into<String>) {
        self.emit(DeskEvent::alert(level, message));
    }

    // ------------------------------------------------------------------
    // Event dispatch
    // ------------------------------------------------------------------

    pub fn handle_event(&mut self, event: HostEvent) -> Flow {
        match event {
            HostEvent::Command { cmd, responder } => {
                let is_stop = matches!(cmd, DeskCommand::Stop);
                let response = self.handle_command(cmd);
                if responder.send(response).is_err() {
                    debug!("Command responder dropped");
                }
                if is_stop {
                    return Flow::Stop;
                }
            }
            HostEvent::ContentLoaded { ticket, result } => self.finish_open(ticket, result),
            HostEvent::WindowRestored { saved, result } => self.finish_restore(saved, result),
            HostEvent::LinkFinished { request, result } => self.finish_link(request, result),
            HostEvent::EditorTimedOut { request_id } => self.editor.forget(request_id),
            HostEvent::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    /// Process a renderer command and return a response.
    pub fn handle_command(&mut self, cmd: DeskCommand) -> DeskResponse {
        debug!("Command: {:?}", cmd);
        match cmd {
            DeskCommand::OpenChapter { chapter_id } => self.open(ContentRef::Chapter { chapter_id }),
            DeskCommand::OpenCodexEntry { entry_id } => self.open(ContentRef::CodexEntry { entry_id }),
            DeskCommand::OpenOutline => self.open(ContentRef::Outline),
            DeskCommand::OpenCodex => self.open(ContentRef::CodexIndex),

            DeskCommand::Focus { window_id } => DeskResponse::from_applied(self.manager.focus(&window_id)),
            DeskCommand::Minimize { window_id } => {
                DeskResponse::from_applied(self.manager.minimize(&window_id))
            }
            DeskCommand::Restore { window_id } => DeskResponse::from_applied(self.manager.restore(&window_id)),
            DeskCommand::Close { window_id } => match self.manager.close(&window_id) {
                Some(_) => {
                    let failed = self.editor.window_closed(&window_id);
                    info!("Closed {} ({} editor requests dropped)", window_id, failed);
                    DeskResponse::Ok
                }
                None => DeskResponse::Ignored,
            },
            DeskCommand::ScrollIntoView { window_id } => {
                if self.manager.registry().contains(&window_id) {
                    self.manager.scroll_into_view(&window_id);
                    DeskResponse::Ok
                } else {
                    DeskResponse::Ignored
                }
            }
            DeskCommand::MoveWindow { window_id, x, y } => {
                DeskResponse::from_applied(self.manager.move_window(&window_id, Point::new(x, y)))
            }
            DeskCommand::ResizeWindow {
                window_id,
                width,
                height,
            } => DeskResponse::from_applied(self.manager.resize_window(&window_id, Size::new(width, height))),

            DeskCommand::ZoomIn => {
                self.manager.zoom_in();
                DeskResponse::Ok
            }
            DeskCommand::ZoomOut => {
                self.manager.zoom_out();
                DeskResponse::Ok
            }
            DeskCommand::ZoomTo { level } => {
                self.manager.zoom_to(level);
                DeskResponse::Ok
            }
            DeskCommand::ZoomAt { level, anchor } => {
                self.manager.zoom_at(level, anchor);
                DeskResponse::Ok
            }
            DeskCommand::Pan { dx, dy } => {
                self.manager.pan_by(dx, dy);
                DeskResponse::Ok
            }
            DeskCommand::FitToView => {
                self.manager.fit_to_view();
                DeskResponse::Ok
            }
            DeskCommand::Arrange => {
                let placements = self.manager.arrange_windows();
                info!("Arranged {} windows", placements.len());
                DeskResponse::Ok
            }
            DeskCommand::ResizeScreen { width, height } => {
                self.manager.set_screen_size(Size::new(width, height));
                DeskResponse::Ok
            }

            DeskCommand::PointerDown {
                window_id,
                region,
                pointer,
            } => DeskResponse::from_applied(self.manager.pointer_down(&window_id, region, pointer)),
            DeskCommand::PointerMove { pointer } => {
                let window_id = self.manager.drag().dragged_window().map(str::to_string);
                match (window_id, self.manager.pointer_move(pointer)) {
                    (Some(window_id), Some(rect)) => geometry_response(window_id, rect),
                    _ => DeskResponse::Ignored,
                }
            }
            DeskCommand::PointerUp { pointer } => match self.manager.pointer_up(pointer) {
                Some(commit) => geometry_response(commit.window_id, commit.rect),
                None => DeskResponse::Ignored,
            },
            DeskCommand::PointerCancel => match self.manager.cancel_drag() {
                Some(commit) => geometry_response(commit.window_id, commit.rect),
                None => DeskResponse::Ignored,
            },

            DeskCommand::LinkDragStart { format, data } => match LinkPayload::decode(&format, &data) {
                Some(payload) => {
                    self.manager.link_drag_start(payload);
                    DeskResponse::Ok
                }
                None => DeskResponse::Ignored,
            },
            DeskCommand::LinkDragEnter { window_id } => {
                let highlighted = self.manager.link_drag_enter(&window_id);
                DeskResponse::Highlight {
                    window_id,
                    highlighted,
                }
            }
            DeskCommand::LinkDragLeave { window_id } => {
                if self.manager.link_drag_leave(&window_id) {
                    DeskResponse::Highlight {
                        window_id,
                        highlighted: false,
                    }
                } else {
                    DeskResponse::Ignored
                }
            }
            DeskCommand::LinkDrop { window_id } => {
                let request = self.manager.link_drop(&window_id);
                self.start_link(request)
            }
            DeskCommand::LinkDropAt { pointer } => {
                let request = self.manager.link_drop_at(pointer);
                self.start_link(request)
            }
            DeskCommand::LinkDragEnd => {
                self.manager.link_drag_end();
                DeskResponse::Ok
            }

            DeskCommand::EditorSelection { window_id } => {
                self.editor_request(&window_id, |bridge| bridge.request_selection(&window_id))
            }
            DeskCommand::EditorReplace {
                window_id,
                from,
                to,
                text,
            } => self.editor_request(&window_id, |bridge| bridge.replace_range(&window_id, from, to, text)),
            DeskCommand::EditorSerialize { window_id } => {
                self.editor_request(&window_id, |bridge| bridge.request_html(&window_id))
            }
            DeskCommand::EditorSetEditable { window_id, editable } => {
                if !self.manager.registry().contains(&window_id) {
                    return DeskResponse::Ignored;
                }
                let message = self.editor.set_editable(&window_id, editable);
                self.emit(DeskEvent::Editor { message });
                DeskResponse::Ok
            }
            DeskCommand::EditorReply { message } => DeskResponse::from_applied(self.editor.resolve(message)),

            DeskCommand::TaskbarList => DeskResponse::Taskbar {
                entries: self.manager.taskbar_entries(),
            },
            DeskCommand::TaskbarActivate { window_id } => match self.manager.taskbar_activate(&window_id) {
                TaskbarAction::Ignored => DeskResponse::Ignored,
                TaskbarAction::Restored | TaskbarAction::Focused => DeskResponse::Ok,
            },

            DeskCommand::QueryLayout => self.layout_response(),
            DeskCommand::Save => match self.save() {
                Ok(()) => DeskResponse::Ok,
                Err(e) => DeskResponse::error(format!("Failed to save layout: {}", e)),
            },
            DeskCommand::Reload => match self.reload_config() {
                Ok(warnings) => {
                    for w in &warnings {
                        warn!("Config: {} - {}", w.field, w.message);
                    }
                    DeskResponse::Ok
                }
                Err(e) => DeskResponse::error(format!("Failed to reload config: {:#}", e)),
            },
            DeskCommand::Stop => {
                info!("Stop requested");
                DeskResponse::Ok
            }
        }
    }

    // ------------------------------------------------------------------
    // Opening windows
    // ------------------------------------------------------------------

    fn open(&mut self, content: ContentRef) -> DeskResponse {
        let window_id = content.window_id();
        match self.manager.begin_open(&window_id) {
            OpenRequest::AlreadyOpen(outcome) => {
                debug!("{} already open ({:?})", window_id, outcome);
                self.manager.scroll_into_view(&window_id);
                DeskResponse::Ok
            }
            OpenRequest::Fetch(ticket) => {
                let provider = Arc::clone(&self.provider);
                let novel_id = self.novel_id.clone();
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result = content::fetch(provider.as_ref(), &novel_id, &content).await;
                    let _ = events.send(HostEvent::ContentLoaded { ticket, result }).await;
                });
                DeskResponse::Pending { window_id }
            }
        }
    }

    /// Build the spec for a freshly fetched window.
    fn spec_for(&self, handle: ContentHandle, rect: Option<Rect>) -> WindowSpec {
        let defaults = config::window_defaults(&self.rules, &self.config.layout, &handle.source, &handle.title);
        let rect = rect.unwrap_or_else(|| {
            let origin = self.manager.next_cascade_origin();
            Rect::new(origin.x, origin.y, defaults.width, defaults.height)
        });
        WindowSpec::new(handle.source.window_id(), handle.title.clone(), rect)
            .with_content(handle)
            .with_icon(defaults.icon)
            .closable(defaults.closable)
    }

    fn finish_open(&mut self, ticket: OpenTicket, result: Result<ContentHandle, ContentError>) {
        match result {
            Ok(handle) => {
                let window_id = ticket.window_id.clone();
                let spec = self.spec_for(handle, None);
                match self.manager.complete_open(&ticket, spec) {
                    OpenResolution::Created => {
                        info!("Opened {}", window_id);
                        self.manager.scroll_into_view(&window_id);
                        self.emit_window_opened(&window_id);
                    }
                    OpenResolution::Stale => debug!("Discarding stale content for {}", window_id),
                }
            }
            Err(e) => {
                if self.manager.abandon_open(&ticket) {
                    warn!("Failed to open {}: {}", ticket.window_id, e);
                    self.alert(AlertLevel::Error, format!("Could not open {}: {}", ticket.window_id, e));
                } else {
                    debug!("Discarding stale failure for {}: {}", ticket.window_id, e);
                }
            }
        }
    }

    fn emit_window_opened(&self, window_id: &str) {
        if let Some(record) = self.manager.registry().get(window_id) {
            let body = record.content.as_ref().map(|c| c.body.clone()).unwrap_or_default();
            self.emit(DeskEvent::WindowOpened {
                window: self.window_info(record),
                body,
            });
        }
    }

    // ------------------------------------------------------------------
    // Restoring a saved layout
    // ------------------------------------------------------------------

    /// Load the saved layout and fetch content for its windows in the background.
    ///
    /// Each window loads on its own, so one slow fetch only delays that
    /// window. An empty layout opens the outline and codex instead.
    pub fn begin_restore(&mut self) {
        let layout = persistence::load_state(self.store.as_ref(), &self.novel_id);
        self.manager.apply_viewport(&layout.viewport);
        info!(
            "Restoring {} windows for novel '{}'",
            layout.windows.len(),
            self.novel_id
        );

        if layout.windows.is_empty() {
            for content in [ContentRef::Outline, ContentRef::CodexIndex] {
                if !self.manager.registry().contains(&content.window_id()) {
                    self.open(content);
                }
            }
            self.emit(DeskEvent::LayoutChanged);
            return;
        }

        for saved in &layout.windows {
            let provider = Arc::clone(&self.provider);
            let novel_id = self.novel_id.clone();
            let events = self.events.clone();
            let saved = saved.clone();
            tokio::spawn(async move {
                let result = match ContentRef::from_window_id(&saved.id) {
                    Some(content) => content::fetch(provider.as_ref(), &novel_id, &content).await,
                    None => Err(ContentError::NotFound(saved.id.clone())),
                };
                let _ = events.send(HostEvent::WindowRestored { saved, result }).await;
            });
        }
        self.restoring = layout.windows;
    }

    /// Whether saved windows are still waiting for their content.
    pub fn is_restoring(&self) -> bool {
        !self.restoring.is_empty()
    }

    fn finish_restore(&mut self, saved: PersistedWindow, result: Result<ContentHandle, ContentError>) {
        let Some(idx) = self.restoring.iter().position(|w| w.id == saved.id) else {
            debug!("Ignoring restore result for {}", saved.id);
            return;
        };
        self.restoring.remove(idx);

        match result {
            // opened by hand while its content was loading
            Ok(_) if self.manager.registry().contains(&saved.id) => {}
            Ok(handle) => {
                let spec = self.spec_for(handle, Some(Rect::from_parts(saved.position, saved.size)));
                self.manager.cancel_open(&saved.id);
                self.manager.restore_window(&saved, spec);
                self.emit_window_opened(&saved.id);
            }
            Err(ContentError::NotFound(_)) => debug!("Dropping saved window {}: content is gone", saved.id),
            Err(e) => warn!("Dropping saved window {}: {}", saved.id, e),
        }

        if self.restoring.is_empty() {
            info!(
                "Restore finished with {} windows open",
                self.manager.registry().len()
            );
            self.emit(DeskEvent::LayoutChanged);
        }
    }

    // ------------------------------------------------------------------
    // Links and editors
    // ------------------------------------------------------------------

    fn start_link(&mut self, request: Option<LinkRequest>) -> DeskResponse {
        let Some(request) = request else {
            return DeskResponse::Ignored;
        };
        let Some(target) = ContentRef::from_window_id(&request.target) else {
            return DeskResponse::Ignored;
        };

        let provider = Arc::clone(&self.provider);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = provider.create_link(&target, &request.payload.entry_id).await;
            let _ = events.send(HostEvent::LinkFinished { request, result }).await;
        });
        DeskResponse::Ok
    }

    fn finish_link(&mut self, request: LinkRequest, result: Result<(), ContentError>) {
        match result {
            Ok(()) => {
                if self.manager.complete_link(&request) {
                    self.emit(DeskEvent::LinkCreated {
                        window_id: request.target,
                        entry_id: request.payload.entry_id,
                    });
                }
            }
            Err(e) => {
                warn!("Failed to link {} to {}: {}", request.payload.entry_id, request.target, e);
                self.alert(AlertLevel::Error, format!("Could not create link: {}", e));
            }
        }
    }

    fn editor_request(
        &mut self,
        window_id: &str,
        issue: impl FnOnce(&mut EditorBridge) -> IssuedRequest,
    ) -> DeskResponse {
        if !self.manager.registry().contains(window_id) {
            return DeskResponse::Ignored;
        }
        let IssuedRequest {
            request_id,
            message,
            reply,
        } = issue(&mut self.editor);
        self.emit(DeskEvent::Editor { message });

        let timeout = Duration::from_millis(self.config.behavior.editor_timeout_ms);
        let outbound = self.outbound.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, reply).await {
                Ok(Ok(reply)) => editor::reply_to_result(reply),
                Ok(Err(_)) => EditorResult::Failed {
                    message: "window closed".to_string(),
                },
                Err(_) => {
                    let _ = events.send(HostEvent::EditorTimedOut { request_id }).await;
                    EditorResult::Failed {
                        message: "editor did not respond".to_string(),
                    }
                }
            };
            let _ = outbound.send(DeskEvent::EditorResult { request_id, result });
        });
        DeskResponse::EditorPending { request_id }
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    fn window_info(&self, record: &WindowRecord) -> WindowInfo {
        WindowInfo {
            id: record.id.clone(),
            title: record.title.clone(),
            x: record.position.x,
            y: record.position.y,
            width: record.size.width,
            height: record.size.height,
            z_index: record.z_index,
            is_minimized: record.is_minimized,
            is_active: self.manager.registry().active() == Some(record.id.as_str()),
            closable: record.closable,
            icon: record.icon.clone(),
            tags: self.manager.drop_zones().tags(&record.id).to_vec(),
        }
    }

    /// All windows back to front, plus the viewport.
    pub fn layout_response(&self) -> DeskResponse {
        let mut records: Vec<&WindowRecord> = self.manager.registry().iter().collect();
        records.sort_by_key(|w| w.z_index);
        let viewport = self.manager.viewport();
        DeskResponse::Layout {
            windows: records.into_iter().map(|w| self.window_info(w)).collect(),
            viewport: ViewportInfo {
                pan_x: viewport.pan_offset().x,
                pan_y: viewport.pan_offset().y,
                zoom: viewport.zoom_level(),
            },
            active: self.manager.registry().active().map(str::to_string),
        }
    }

    // ------------------------------------------------------------------
    // Persistence and configuration
    // ------------------------------------------------------------------

    /// True once per batch of layout changes; used to (re)arm the save debounce.
    pub fn take_changes(&mut self) -> bool {
        let revision = self.manager.revision();
        let changed = revision != self.seen_revision;
        self.seen_revision = revision;
        changed
    }

    /// Whether the layout changed since the last save.
    pub fn needs_save(&self) -> bool {
        self.manager.revision() != self.saved_revision
    }

    /// Write the current layout now.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut snapshot = self.manager.snapshot(saved_at);
        // keep saved windows that have not finished loading, behind the live ones
        let pending: Vec<PersistedWindow> = self
            .restoring
            .iter()
            .filter(|w| !self.manager.registry().contains(&w.id))
            .cloned()
            .collect();
        if !pending.is_empty() {
            snapshot.windows.splice(0..0, pending);
        }
        persistence::save_state(self.store.as_mut(), &self.novel_id, &snapshot)?;
        self.saved_revision = self.manager.revision();
        Ok(())
    }

    /// Reload configuration and apply it to the running session.
    pub fn reload_config(&mut self) -> anyhow::Result<Vec<config::ConfigWarning>> {
        let mut config = match &self.config_path {
            Some(path) => Config::load_from_path(path)?,
            None => Config::load()?,
        };
        let warnings = config.validate();
        self.apply_config(config)?;
        Ok(warnings)
    }

    /// Apply an already validated configuration.
    pub fn apply_config(&mut self, config: Config) -> Result<(), LayoutError> {
        self.manager.apply_settings(config.manager_settings())?;
        self.rules = config.compile_window_rules();
        self.config = config;
        info!("Configuration applied ({} window rules)", self.rules.len());
        Ok(())
    }
}

fn geometry_response(window_id: String, rect: Rect) -> DeskResponse {
    DeskResponse::Geometry {
        window_id,
        x: rect.x,
        y: rect.y,
        width: rect.width,
        height: rect.height,
    }
}
