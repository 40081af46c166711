use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{Notice, NoticeKind};
use crate::ui::Theme;

/// Status bar showing keyboard shortcuts, or a pending notice
pub struct StatusBar<'a> {
    hints: Vec<(&'a str, &'a str)>,
    notice: Option<&'a Notice>,
    right_text: Option<String>,
}

impl<'a> StatusBar<'a> {
    pub fn new() -> Self {
        Self {
            hints: Vec::new(),
            notice: None,
            right_text: None,
        }
    }

    /// Add keyboard hints as (key, description) pairs
    pub fn hints<I>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.hints = hints.into_iter().collect();
        self
    }

    /// Show a notice in place of the hints
    pub fn notice(mut self, notice: Option<&'a Notice>) -> Self {
        self.notice = notice;
        self
    }

    /// Set text to display on the right side
    pub fn right<S: Into<String>>(mut self, text: S) -> Self {
        self.right_text = Some(text.into());
        self
    }
}

impl Default for StatusBar<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, Theme::status_bar());

        let line = match self.notice {
            Some(notice) => {
                let style = match notice.kind {
                    NoticeKind::Info => Theme::notice(),
                    NoticeKind::Error => Theme::notice_error(),
                };
                Line::from(vec![
                    Span::styled(notice.text.clone(), style),
                    Span::styled("  (any key)", Theme::status_bar()),
                ])
            }
            None => {
                let mut spans = Vec::new();
                for (i, (key, desc)) in self.hints.iter().enumerate() {
                    if i > 0 {
                        spans.push(Span::styled("  ", Theme::status_bar()));
                    }
                    spans.push(Span::styled(format!("[{}]", key), Theme::status_bar_key()));
                    spans.push(Span::styled(format!(" {}", desc), Theme::status_bar()));
                }
                Line::from(spans)
            }
        };

        let line_width = line.width() as u16;
        buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(2));

        if let Some(right) = self.right_text {
            let right_width = right.width() as u16;
            let right_x = area.x + area.width.saturating_sub(right_width + 2);
            if right_x > area.x + line_width + 2 {
                let right_span = Span::styled(&right, Theme::status_bar());
                buf.set_span(right_x, area.y, &right_span, right_width);
            }
        }
    }
}

/// Default hints for list navigation screens
pub fn list_nav_hints() -> Vec<(&'static str, &'static str)> {
    vec![
        ("↑/k", "Up"),
        ("↓/j", "Down"),
        ("Enter", "Select"),
        ("Esc", "Back"),
        ("q", "Quit"),
    ]
}

/// Hints for the log viewer; the first entry reflects the session state
pub fn log_viewer_hints(tailing: bool, can_start: bool) -> Vec<(&'static str, &'static str)> {
    let mut hints = Vec::new();
    // Start is unavailable until a log is picked
    if tailing {
        hints.push(("s", "Stop"));
    } else if can_start {
        hints.push(("s", "Start"));
    }
    hints.extend([
        ("/", "Filter"),
        ("c", "Clear"),
        ("e", "Export"),
        ("o", "Logs"),
        ("?", "Help"),
    ]);
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_text(buf: &Buffer, width: u16) -> String {
        (0..width).map(|x| buf[(x, 0)].symbol()).collect()
    }

    #[test]
    fn test_renders_hints_and_right_text() {
        let area = Rect::new(0, 0, 60, 1);
        let mut buf = Buffer::empty(area);
        StatusBar::new()
            .hints(vec![("s", "Start"), ("q", "Quit")])
            .right("42 lines")
            .render(area, &mut buf);

        let text = row_text(&buf, 60);
        assert!(text.contains("[s] Start"));
        assert!(text.contains("[q] Quit"));
        assert!(text.contains("42 lines"));
    }

    #[test]
    fn test_notice_replaces_hints() {
        let area = Rect::new(0, 0, 60, 1);
        let mut buf = Buffer::empty(area);
        let notice = Notice {
            text: "select a log name".to_string(),
            kind: NoticeKind::Error,
        };
        StatusBar::new()
            .hints(vec![("s", "Start")])
            .notice(Some(&notice))
            .render(area, &mut buf);

        let text = row_text(&buf, 60);
        assert!(text.contains("select a log name"));
        assert!(!text.contains("[s] Start"));
    }

    #[test]
    fn test_start_hint_needs_a_selected_log() {
        let keys = |hints: Vec<(&'static str, &'static str)>| hints.into_iter().map(|(k, _)| k).collect::<Vec<_>>();

        assert!(!keys(log_viewer_hints(false, false)).contains(&"s"));
        assert!(log_viewer_hints(false, true).contains(&("s", "Start")));
        assert!(log_viewer_hints(true, true).contains(&("s", "Stop")));
    }
}
