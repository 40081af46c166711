//! TUI components for hoihoi
//!
//! This crate provides the terminal user interface for hoihoi,
//! including state management, keybindings, event handling, and UI components.

pub mod app;
pub mod config;
pub mod tui;
pub mod ui;

pub use app::{Action, AppState, Notice, NoticeKind, Screen, UiState, ViewSettings};
pub use config::{KeyBinding, KeyBindings, KeyContext};
pub use tui::{Event, EventHandler, Tui, install_panic_hook};
pub use ui::components::{HelpOverlay, ListRow, ListSelector, StatusBar, list_nav_hints};
pub use ui::screens::{LogViewerScreen, SessionView, TargetSelectScreen};
pub use ui::{Layout, Theme};
