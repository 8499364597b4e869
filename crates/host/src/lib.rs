//! QuillDesk host
//!
//! Owns the window manager for one novel and talks to the renderer over
//! newline-delimited JSON.
//!
//! Responsibilities:
//! - Process renderer commands against the canvas layout
//! - Fetch window content from the content backend
//! - Route editor requests and replies
//! - Persist the layout per novel, debounced

pub mod config;
pub mod content;
pub mod editor;
pub mod persistence;
pub mod session;

pub use config::Config;
pub use session::{Flow, HostEvent, Session};
