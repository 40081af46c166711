//! Realtime tail core for hoihoi
//!
//! This crate provides the tail session controller, the log buffer, the
//! filter/render projection, and the export helper.

mod buffer;
pub mod export;
mod filter;
mod session;
pub mod window;

pub use buffer::{BufferCursor, BufferDelta, LogBuffer};
pub use export::{ExportSummary, ExportVariant, build_file_name, serialize, write_export};
pub use filter::{Projection, Refresh, TextFilter, project, project_with};
pub use session::{SessionController, SessionError, SessionUpdate};
pub use window::{
    RenderStrategy, Viewport, choose_render_strategy, max_scroll_offset, rows_to_render,
    visible_range,
};

// Re-export types used in our public API
pub use hoihoi_types::{LogLine, SessionStatus, SharedLogLine, TailTarget};
