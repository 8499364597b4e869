//! Configuration management for the QuillDesk host.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. the platform config dir (`ProjectDirs`), e.g. `~/.config/quilldesk/config.toml` on Linux
//! 2. `~/.config/quilldesk/config.toml` (Unix-style, also used on other platforms)
//! 3. `./config.toml` (current directory, for development)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use quilldesk_core_layout::{
    ArrangeSettings, ContentRef, ManagerSettings, Size, ZoomSettings, CODEX_WINDOW_ID,
    OUTLINE_WINDOW_ID,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure for QuillDesk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Canvas and zoom configuration.
    pub canvas: CanvasConfig,
    /// Window placement and tiling configuration.
    pub layout: LayoutConfig,
    /// Layout persistence configuration.
    pub persistence: PersistenceConfig,
    /// Behavior configuration.
    pub behavior: BehaviorConfig,
    /// Window rules for per-window defaults.
    #[serde(default)]
    pub window_rules: Vec<WindowRule>,
}

/// Canvas-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,

    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,

    /// Factor applied by one zoom in/out step.
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,

    /// Padding around the windows when fitting them to the view.
    #[serde(default = "default_fit_padding")]
    pub fit_padding: f64,

    /// Padding kept around a window scrolled into view.
    #[serde(default = "default_scroll_padding")]
    pub scroll_padding: f64,

    /// Screen size assumed until the renderer reports the real one.
    #[serde(default = "default_screen_width")]
    pub default_screen_width: f64,

    #[serde(default = "default_screen_height")]
    pub default_screen_height: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            zoom_step: default_zoom_step(),
            fit_padding: default_fit_padding(),
            scroll_padding: default_scroll_padding(),
            default_screen_width: default_screen_width(),
            default_screen_height: default_screen_height(),
        }
    }
}

/// Layout-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Gap between tiled windows in canvas units.
    #[serde(default = "default_gap")]
    pub gap: f64,

    /// Margin around the tiled area in canvas units.
    #[serde(default = "default_outer_gap")]
    pub outer_gap: f64,

    /// Size of newly opened windows.
    #[serde(default = "default_window_width")]
    pub default_window_width: f64,

    #[serde(default = "default_window_height")]
    pub default_window_height: f64,

    /// Smallest size a window can be resized to.
    #[serde(default = "default_min_window_width")]
    pub min_window_width: f64,

    #[serde(default = "default_min_window_height")]
    pub min_window_height: f64,

    /// Window ids that always sort first in the taskbar and when tiling.
    #[serde(default = "default_pinned")]
    pub pinned: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            gap: default_gap(),
            outer_gap: default_outer_gap(),
            default_window_width: default_window_width(),
            default_window_height: default_window_height(),
            min_window_width: default_min_window_width(),
            min_window_height: default_min_window_height(),
            pinned: default_pinned(),
        }
    }
}

/// Persistence-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Quiet period before a layout change is written.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Directory for saved layouts. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            data_dir: None,
        }
    }
}

/// Behavior-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Root directory holding one sub-directory per novel.
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,

    /// How long to wait for an editor to answer a request.
    #[serde(default = "default_editor_timeout_ms")]
    pub editor_timeout_ms: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            content_root: default_content_root(),
            editor_timeout_ms: default_editor_timeout_ms(),
        }
    }
}

// Default value functions for serde
fn default_min_zoom() -> f64 {
    0.25
}

fn default_max_zoom() -> f64 {
    3.0
}

fn default_zoom_step() -> f64 {
    1.2
}

fn default_fit_padding() -> f64 {
    40.0
}

fn default_scroll_padding() -> f64 {
    16.0
}

fn default_screen_width() -> f64 {
    1920.0
}

fn default_screen_height() -> f64 {
    1080.0
}

fn default_gap() -> f64 {
    16.0
}

fn default_outer_gap() -> f64 {
    24.0
}

fn default_window_width() -> f64 {
    720.0
}

fn default_window_height() -> f64 {
    540.0
}

fn default_min_window_width() -> f64 {
    240.0
}

fn default_min_window_height() -> f64 {
    160.0
}

fn default_pinned() -> Vec<String> {
    vec![OUTLINE_WINDOW_ID.to_string(), CODEX_WINDOW_ID.to_string()]
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_content_root() -> PathBuf {
    PathBuf::from("novels")
}

fn default_editor_timeout_ms() -> u64 {
    5000
}

// ============================================================================
// Window Rules
// ============================================================================

/// A rule overriding the defaults for matching windows.
///
/// Window rules are evaluated in order; the first matching rule wins.
///
/// # Example Config
///
/// ```toml
/// [[window_rules]]
/// match_id = "^outline-window$"
/// width = 420
/// height = 900
///
/// [[window_rules]]
/// match_id = "^codex-entry-"
/// icon = "book"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRule {
    /// Regex pattern matched against the window id.
    #[serde(default)]
    pub match_id: Option<String>,

    /// Regex pattern matched against the window title.
    #[serde(default)]
    pub match_title: Option<String>,

    #[serde(default)]
    pub width: Option<f64>,

    #[serde(default)]
    pub height: Option<f64>,

    /// Override whether the user may close the window.
    #[serde(default)]
    pub closable: Option<bool>,

    /// Icon token passed through to the renderer.
    #[serde(default)]
    pub icon: Option<String>,
}

/// A window rule with pre-compiled regex patterns.
#[derive(Debug, Clone)]
pub struct CompiledWindowRule {
    match_id: Option<Regex>,
    match_title: Option<Regex>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub closable: Option<bool>,
    pub icon: Option<String>,
}

impl CompiledWindowRule {
    /// Check if this rule matches a window.
    ///
    /// All specified match criteria must match for the rule to apply.
    /// If no match criteria are specified, the rule matches nothing.
    pub fn matches(&self, window_id: &str, title: &str) -> bool {
        if self.match_id.is_none() && self.match_title.is_none() {
            return false;
        }
        if let Some(re) = &self.match_id {
            if !re.is_match(window_id) {
                return false;
            }
        }
        if let Some(re) = &self.match_title {
            if !re.is_match(title) {
                return false;
            }
        }
        true
    }
}

/// Per-window defaults after applying the first matching rule.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDefaults {
    pub width: f64,
    pub height: f64,
    pub closable: bool,
    pub icon: String,
}

/// Resolve defaults for a window from the compiled rules.
///
/// Permanent windows are never closable, whatever the rules say.
pub fn window_defaults(
    rules: &[CompiledWindowRule],
    layout: &LayoutConfig,
    content: &ContentRef,
    title: &str,
) -> WindowDefaults {
    let window_id = content.window_id();
    let mut defaults = WindowDefaults {
        width: layout.default_window_width,
        height: layout.default_window_height,
        closable: !content.is_permanent(),
        icon: default_icon(content).to_string(),
    };

    if let Some(rule) = rules.iter().find(|r| r.matches(&window_id, title)) {
        if let Some(width) = rule.width {
            defaults.width = width;
        }
        if let Some(height) = rule.height {
            defaults.height = height;
        }
        if let Some(closable) = rule.closable {
            defaults.closable = closable && !content.is_permanent();
        }
        if let Some(icon) = &rule.icon {
            defaults.icon = icon.clone();
        }
    }
    defaults
}

fn default_icon(content: &ContentRef) -> &'static str {
    match content {
        ContentRef::Outline => "outline",
        ContentRef::CodexIndex => "codex",
        ContentRef::Chapter { .. } => "chapter",
        ContentRef::CodexEntry { .. } => "codex-entry",
    }
}

/// A problem found (and corrected) while validating the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Load configuration from standard locations.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        let paths = config_paths();

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Clamp invalid values back to usable ones.
    ///
    /// Returns one warning per corrected field.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let canvas = &mut self.canvas;

        // the zoom range has to contain 1.0
        if !(canvas.min_zoom.is_finite() && canvas.min_zoom > 0.0 && canvas.min_zoom <= 1.0) {
            warnings.push(ConfigWarning::new(
                "canvas.min_zoom",
                format!("{} is not in (0, 1], using {}", canvas.min_zoom, default_min_zoom()),
            ));
            canvas.min_zoom = default_min_zoom();
        }
        if !canvas.max_zoom.is_finite() || canvas.max_zoom < 1.0 || canvas.max_zoom < canvas.min_zoom {
            let fixed = default_max_zoom().max(canvas.min_zoom);
            warnings.push(ConfigWarning::new(
                "canvas.max_zoom",
                format!("{} is below 1 or min_zoom, using {}", canvas.max_zoom, fixed),
            ));
            canvas.max_zoom = fixed;
        }
        if !(canvas.zoom_step.is_finite() && canvas.zoom_step > 1.0) {
            warnings.push(ConfigWarning::new(
                "canvas.zoom_step",
                format!("{} must be greater than 1, using {}", canvas.zoom_step, default_zoom_step()),
            ));
            canvas.zoom_step = default_zoom_step();
        }
        for (field, value, default) in [
            ("canvas.fit_padding", &mut canvas.fit_padding, default_fit_padding()),
            ("canvas.scroll_padding", &mut canvas.scroll_padding, default_scroll_padding()),
            ("layout.gap", &mut self.layout.gap, default_gap()),
            ("layout.outer_gap", &mut self.layout.outer_gap, default_outer_gap()),
        ] {
            if !(value.is_finite() && *value >= 0.0) {
                warnings.push(ConfigWarning::new(field, format!("{value} is negative, using {default}")));
                *value = default;
            }
        }
        for (field, value, default) in [
            ("canvas.default_screen_width", &mut canvas.default_screen_width, default_screen_width()),
            ("canvas.default_screen_height", &mut canvas.default_screen_height, default_screen_height()),
            ("layout.min_window_width", &mut self.layout.min_window_width, default_min_window_width()),
            ("layout.min_window_height", &mut self.layout.min_window_height, default_min_window_height()),
        ] {
            if !(value.is_finite() && *value > 0.0) {
                warnings.push(ConfigWarning::new(field, format!("{value} must be positive, using {default}")));
                *value = default;
            }
        }

        let layout = &mut self.layout;
        if !(layout.default_window_width.is_finite()) || layout.default_window_width < layout.min_window_width {
            warnings.push(ConfigWarning::new(
                "layout.default_window_width",
                format!("raised to min_window_width ({})", layout.min_window_width),
            ));
            layout.default_window_width = layout.min_window_width;
        }
        if !(layout.default_window_height.is_finite()) || layout.default_window_height < layout.min_window_height {
            warnings.push(ConfigWarning::new(
                "layout.default_window_height",
                format!("raised to min_window_height ({})", layout.min_window_height),
            ));
            layout.default_window_height = layout.min_window_height;
        }

        if self.persistence.debounce_ms > 60_000 {
            warnings.push(ConfigWarning::new(
                "persistence.debounce_ms",
                format!("{} exceeds 60000, clamped", self.persistence.debounce_ms),
            ));
            self.persistence.debounce_ms = 60_000;
        }

        for (i, rule) in self.window_rules.iter().enumerate() {
            for pattern in [&rule.match_id, &rule.match_title].into_iter().flatten() {
                if let Err(e) = Regex::new(pattern) {
                    warnings.push(ConfigWarning::new(
                        &format!("window_rules[{i}]"),
                        format!("invalid regex '{pattern}': {e}; rule skipped"),
                    ));
                }
            }
        }

        warnings
    }

    /// Compile window rules, skipping any with an invalid pattern.
    pub fn compile_window_rules(&self) -> Vec<CompiledWindowRule> {
        self.window_rules
            .iter()
            .filter_map(|rule| {
                let compile = |pattern: &Option<String>| -> Result<Option<Regex>, regex::Error> {
                    pattern.as_deref().map(Regex::new).transpose()
                };
                match (compile(&rule.match_id), compile(&rule.match_title)) {
                    (Ok(match_id), Ok(match_title)) => Some(CompiledWindowRule {
                        match_id,
                        match_title,
                        width: rule.width,
                        height: rule.height,
                        closable: rule.closable,
                        icon: rule.icon.clone(),
                    }),
                    (Err(e), _) | (_, Err(e)) => {
                        tracing::warn!("Skipping window rule with invalid regex: {}", e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Settings for the window manager.
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            zoom: ZoomSettings {
                min_zoom: self.canvas.min_zoom,
                max_zoom: self.canvas.max_zoom,
                zoom_step: self.canvas.zoom_step,
            },
            screen: Size::new(self.canvas.default_screen_width, self.canvas.default_screen_height),
            arrange: ArrangeSettings {
                gap: self.layout.gap,
                outer_gap: self.layout.outer_gap,
                pinned: self.layout.pinned.clone(),
            },
            min_window_size: Size::new(self.layout.min_window_width, self.layout.min_window_height),
            fit_padding: self.canvas.fit_padding,
            scroll_padding: self.canvas.scroll_padding,
        }
    }
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(proj_dirs) = ProjectDirs::from("", "", "quilldesk") {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    if let Some(home) = dirs_home() {
        let unix_style = home.join(".config").join("quilldesk").join("config.toml");
        if !paths.contains(&unix_style) {
            paths.push(unix_style);
        }
    }

    paths.push(PathBuf::from("config.toml"));

    paths
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
