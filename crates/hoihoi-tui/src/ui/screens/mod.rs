mod log_viewer;
mod target_select;

pub use log_viewer::{LogViewerScreen, SessionView};
pub use target_select::TargetSelectScreen;
