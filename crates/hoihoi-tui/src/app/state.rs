use ratatui::widgets::ListState;
use tokio::sync::mpsc;

use hoihoi_logs::export::DEFAULT_EXPORT_PREFIX;
use hoihoi_logs::window::{DEFAULT_OVERSCAN, DEFAULT_WINDOW_THRESHOLD};
use hoihoi_logs::{LogBuffer, Projection, SharedLogLine, TailTarget, TextFilter, max_scroll_offset};
use hoihoi_types::LogSource;

use super::Action;

/// Screen enumeration
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    TargetSelect,
    LogViewer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// One-line message shown in the status bar until dismissed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
}

/// Rendering knobs taken from the config file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewSettings {
    /// Switch to windowed rendering above this many visible lines
    pub window_threshold: usize,
    /// Extra rows rendered around the viewport when windowed
    pub overscan: usize,
    /// Start in follow mode
    pub follow: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            window_threshold: DEFAULT_WINDOW_THRESHOLD,
            overscan: DEFAULT_OVERSCAN,
            follow: true,
        }
    }
}

/// UI-specific transient state
pub struct UiState {
    /// Is search/filter bar active?
    pub search_active: bool,

    /// Current search input text
    pub search_input: String,

    /// Currently active filter (None = show all)
    pub active_filter: Option<TextFilter>,

    /// Filter compile error, if any
    pub filter_error: Option<String>,

    /// Is help overlay visible?
    pub help_visible: bool,

    /// List state for the target picker
    pub list_state: ListState,

    /// Message to display (if any)
    pub notice: Option<Notice>,

    /// First visible row in the log viewer
    pub log_scroll: usize,

    /// Follow the newest line?
    pub auto_scroll: bool,

    /// Prefix lines with their source name?
    pub show_source_names: bool,

    /// Rows available for log lines at the last render
    pub viewport_height: usize,

    /// Filtered view of the buffer
    pub projection: Projection,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            search_active: false,
            search_input: String::new(),
            active_filter: None,
            filter_error: None,
            help_visible: false,
            list_state: ListState::default(),
            notice: None,
            log_scroll: 0,
            auto_scroll: true,
            show_source_names: false,
            viewport_height: 0,
            projection: Projection::new(),
        }
    }
}

/// Global application state
pub struct AppState {
    /// Current screen being displayed
    pub current_screen: Screen,

    /// Navigation stack for back navigation
    pub screen_stack: Vec<Screen>,

    /// Catalog of tailable log files
    pub sources: Vec<LogSource>,

    /// Index into `sources` of the selected log
    pub selected_source: Option<usize>,

    /// Host (CVM address) new sessions address
    pub host: String,

    pub view: ViewSettings,

    /// UI state
    pub ui_state: UiState,

    /// Whether app should quit
    pub should_quit: bool,

    /// Channel sender for follow-up actions
    pub action_tx: mpsc::UnboundedSender<Action>,
}

impl AppState {
    pub fn new(
        sources: Vec<LogSource>,
        host: String,
        view: ViewSettings,
        action_tx: mpsc::UnboundedSender<Action>,
    ) -> Self {
        let mut ui_state = UiState {
            auto_scroll: view.follow,
            ..UiState::default()
        };
        ui_state.list_state.select(Some(0));

        Self {
            current_screen: Screen::TargetSelect,
            screen_stack: Vec::new(),
            sources,
            selected_source: None,
            host,
            view,
            ui_state,
            should_quit: false,
            action_tx,
        }
    }

    /// Navigate to a new screen, pushing current to stack
    pub fn navigate_to(&mut self, screen: Screen) {
        if self.current_screen == screen {
            return;
        }
        self.screen_stack.push(self.current_screen.clone());
        self.current_screen = screen;
        let selected = self.selected_source.unwrap_or(0);
        self.ui_state.list_state.select(Some(selected));
    }

    /// Go back to previous screen
    pub fn go_back(&mut self) -> bool {
        if let Some(prev_screen) = self.screen_stack.pop() {
            self.current_screen = prev_screen;
            true
        } else {
            false
        }
    }

    /// Get the current list length based on screen
    pub fn current_list_len(&self) -> usize {
        match self.current_screen {
            Screen::TargetSelect => self.sources.len(),
            Screen::LogViewer => 0,
        }
    }

    /// Move selection up
    pub fn list_up(&mut self) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }

        let i = match self.ui_state.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.ui_state.list_state.select(Some(i));
    }

    /// Move selection down
    pub fn list_down(&mut self) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }

        let i = match self.ui_state.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.ui_state.list_state.select(Some(i));
    }

    /// Get currently highlighted index
    pub fn selected_index(&self) -> Option<usize> {
        self.ui_state.list_state.selected()
    }

    /// Mark a catalog entry as the target for the next start
    pub fn select_source(&mut self, index: usize) -> bool {
        if index < self.sources.len() {
            self.selected_source = Some(index);
            self.ui_state.list_state.select(Some(index));
            true
        } else {
            false
        }
    }

    /// Select a catalog entry by name
    pub fn select_source_by_name(&mut self, name: &str) -> bool {
        match self.sources.iter().position(|s| s.name == name) {
            Some(index) => self.select_source(index),
            None => false,
        }
    }

    pub fn selected_source(&self) -> Option<&LogSource> {
        self.selected_source.and_then(|i| self.sources.get(i))
    }

    /// Target built from the current selection; empty fields when nothing is selected
    pub fn selected_target(&self) -> TailTarget {
        match self.selected_source() {
            Some(source) => TailTarget::from_source(source, self.host.clone()),
            None => TailTarget {
                host: self.host.clone(),
                ..TailTarget::default()
            },
        }
    }

    /// File name prefix for exports
    pub fn export_prefix(&self) -> String {
        self.selected_source()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| DEFAULT_EXPORT_PREFIX.to_string())
    }

    /// Show an informational message
    pub fn show_notice(&mut self, msg: impl Into<String>) {
        self.ui_state.notice = Some(Notice {
            text: msg.into(),
            kind: NoticeKind::Info,
        });
    }

    /// Show an error message
    pub fn show_error(&mut self, msg: impl Into<String>) {
        self.ui_state.notice = Some(Notice {
            text: msg.into(),
            kind: NoticeKind::Error,
        });
    }

    /// Dismiss the current message
    pub fn dismiss_notice(&mut self) {
        self.ui_state.notice = None;
    }

    /// Start search/filter input mode
    pub fn start_search(&mut self) {
        self.ui_state.search_active = true;
        self.ui_state.search_input = self
            .ui_state
            .active_filter
            .as_ref()
            .map(|f| f.pattern().to_string())
            .unwrap_or_default();
        self.ui_state.filter_error = None;
    }

    /// Cancel search input and clear the filter
    pub fn cancel_search(&mut self) {
        self.ui_state.search_active = false;
        self.ui_state.search_input.clear();
        self.ui_state.active_filter = None;
        self.ui_state.filter_error = None;
    }

    /// Apply the current search input as a filter
    pub fn apply_filter(&mut self) {
        self.ui_state.search_active = false;
        self.ui_state.filter_error = None;

        if self.ui_state.search_input.is_empty() {
            self.ui_state.active_filter = None;
            return;
        }

        match TextFilter::new(&self.ui_state.search_input) {
            Ok(filter) => {
                self.ui_state.active_filter = Some(filter);
            }
            Err(e) => {
                self.ui_state.filter_error = Some(format!("Invalid filter: {}", e));
                self.ui_state.search_active = true; // Keep input open to fix
            }
        }
    }

    /// Clear the active filter
    pub fn clear_filter(&mut self) {
        self.ui_state.active_filter = None;
        self.ui_state.search_input.clear();
        self.ui_state.filter_error = None;
    }

    /// Add a character to search input
    pub fn search_input_char(&mut self, c: char) {
        self.ui_state.search_input.push(c);
    }

    /// Remove last character from search input
    pub fn search_input_backspace(&mut self) {
        self.ui_state.search_input.pop();
    }

    /// Bring the visible lines up to date with the buffer and filter
    ///
    /// New lines are filtered on their own; the whole buffer is only
    /// re-filtered after a clear, an eviction or a filter change.
    pub fn refresh_projection(&mut self, buffer: &LogBuffer) -> usize {
        let filter = self.ui_state.active_filter.as_ref();
        self.ui_state.projection.refresh(buffer, filter);
        self.ui_state.projection.len()
    }

    /// Lines currently passing the filter
    pub fn visible_lines(&self) -> &[SharedLogLine] {
        self.ui_state.projection.lines()
    }

    /// Largest valid scroll offset for the current projection
    pub fn max_scroll(&self) -> usize {
        max_scroll_offset(
            self.ui_state.projection.len(),
            1,
            self.ui_state.viewport_height,
        )
    }

    /// Pin to the newest line when following, otherwise keep the offset in range
    pub fn settle_scroll(&mut self) {
        let max = self.max_scroll();
        if self.ui_state.auto_scroll || self.ui_state.log_scroll > max {
            self.ui_state.log_scroll = max;
        }
    }

    /// React to new lines in the same event that delivered them
    pub fn on_lines_appended(&mut self, buffer: &LogBuffer) {
        self.refresh_projection(buffer);
        self.settle_scroll();
    }

    pub fn on_buffer_cleared(&mut self, buffer: &LogBuffer) {
        self.ui_state.log_scroll = 0;
        self.refresh_projection(buffer);
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.ui_state.viewport_height = height;
        self.settle_scroll();
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.ui_state.auto_scroll = false;
        self.ui_state.log_scroll = self.ui_state.log_scroll.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.ui_state.auto_scroll = false;
        self.ui_state.log_scroll = self.ui_state.log_scroll.saturating_add(n).min(self.max_scroll());
    }

    pub fn page_up(&mut self) {
        let page = self.ui_state.viewport_height.max(1);
        self.scroll_up(page);
    }

    pub fn page_down(&mut self) {
        let page = self.ui_state.viewport_height.max(1);
        self.scroll_down(page);
    }

    pub fn scroll_to_top(&mut self) {
        self.ui_state.auto_scroll = false;
        self.ui_state.log_scroll = 0;
    }

    /// Jump to the newest line and resume following
    pub fn scroll_to_bottom(&mut self) {
        self.ui_state.auto_scroll = true;
        self.ui_state.log_scroll = self.max_scroll();
    }

    pub fn toggle_auto_scroll(&mut self) {
        self.ui_state.auto_scroll = !self.ui_state.auto_scroll;
        self.settle_scroll();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoihoi_logs::LogLine;

    fn state() -> AppState {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sources = vec![
            LogSource::new("genesis", "/home/nutanix/data/logs/genesis.out"),
            LogSource::new("stargate", "/home/nutanix/data/logs/stargate.INFO"),
            LogSource::new("acropolis", "/home/nutanix/data/logs/acropolis.out"),
        ];
        AppState::new(sources, "10.0.0.1".to_string(), ViewSettings::default(), tx)
    }

    /// Buffer holding "line 0" .. "line {count - 1}"
    fn buffer(count: usize) -> LogBuffer {
        (0..count)
            .map(|i| LogLine::new("genesis", format!("line {}", i)))
            .collect()
    }

    #[test]
    fn test_list_navigation_wraps() {
        let mut state = state();
        state.list_up();
        assert_eq!(state.selected_index(), Some(2));
        state.list_down();
        assert_eq!(state.selected_index(), Some(0));
        state.list_down();
        assert_eq!(state.selected_index(), Some(1));
    }

    #[test]
    fn test_selected_target() {
        let mut state = state();
        assert_eq!(state.selected_target().source_name, "");
        assert_eq!(state.export_prefix(), "realtimelog");

        assert!(state.select_source_by_name("stargate"));
        let target = state.selected_target();
        assert_eq!(target.source_name, "stargate");
        assert_eq!(target.source_path, "/home/nutanix/data/logs/stargate.INFO");
        assert_eq!(target.host, "10.0.0.1");
        assert_eq!(state.export_prefix(), "stargate");

        assert!(!state.select_source(9));
        assert_eq!(state.selected_source().unwrap().name, "stargate");
    }

    #[test]
    fn test_filter_projection() {
        let mut state = state();
        let lines = buffer(20);

        assert_eq!(state.refresh_projection(&lines), 20);

        state.ui_state.search_input = "LINE 1".to_string();
        state.apply_filter();
        // line 1, line 10..19
        assert_eq!(state.refresh_projection(&lines), 11);
        assert_eq!(state.visible_lines()[0].text, "line 1");

        state.clear_filter();
        assert_eq!(state.refresh_projection(&lines), 20);
    }

    #[test]
    fn test_follow_pins_to_bottom_on_append() {
        let mut state = state();
        state.set_viewport_height(10);

        state.on_lines_appended(&buffer(25));
        assert_eq!(state.ui_state.log_scroll, 15);

        state.on_lines_appended(&buffer(40));
        assert_eq!(state.visible_lines().len(), 40);
        assert_eq!(state.ui_state.log_scroll, 30);
    }

    #[test]
    fn test_manual_scroll_stops_following() {
        let mut state = state();
        state.set_viewport_height(10);
        state.on_lines_appended(&buffer(50));

        state.scroll_up(5);
        assert!(!state.ui_state.auto_scroll);
        assert_eq!(state.ui_state.log_scroll, 35);

        state.on_lines_appended(&buffer(60));
        assert_eq!(state.ui_state.log_scroll, 35);

        state.scroll_down(1000);
        assert_eq!(state.ui_state.log_scroll, 50);

        state.scroll_to_bottom();
        assert!(state.ui_state.auto_scroll);
    }

    #[test]
    fn test_cleared_buffer_resets_scroll() {
        let mut state = state();
        state.set_viewport_height(10);
        state.on_lines_appended(&buffer(50));

        state.on_buffer_cleared(&LogBuffer::unbounded());
        assert_eq!(state.ui_state.log_scroll, 0);
        assert!(state.visible_lines().is_empty());
    }

    #[test]
    fn test_navigation_stack() {
        let mut state = state();
        state.navigate_to(Screen::LogViewer);
        assert_eq!(state.current_screen, Screen::LogViewer);
        assert!(state.go_back());
        assert_eq!(state.current_screen, Screen::TargetSelect);
        assert!(!state.go_back());
    }
}
