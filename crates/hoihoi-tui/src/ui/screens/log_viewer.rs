use ratatui::{
    Frame,
    layout::{Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use hoihoi_logs::{
    LogBuffer, LogLine, SessionStatus, TailTarget, TextFilter, Viewport, choose_render_strategy,
    rows_to_render,
};

use crate::app::AppState;
use crate::ui::{
    Layout, Theme,
    components::{StatusBar, log_viewer_hints},
};

/// What the log viewer needs to know about the tail session
pub struct SessionView<'a> {
    pub status: SessionStatus,
    /// A tail is requested and not stopped
    pub running: bool,
    /// Target of the running session, or the one the next start will use
    pub target: &'a TailTarget,
    pub last_error: Option<String>,
    pub buffer: &'a LogBuffer,
}

impl SessionView<'_> {
    /// Start needs a log to tail
    pub fn can_start(&self) -> bool {
        !self.target.source_name.trim().is_empty()
    }
}

/// Log viewer screen
pub struct LogViewerScreen;

/// Longest prefix of `s` that fits in `max_width` terminal columns
fn truncate_to_width(s: &str, max_width: usize) -> &str {
    let mut width = 0;
    for (idx, ch) in s.char_indices() {
        width += ch.width().unwrap_or(0);
        if width > max_width {
            return &s[..idx];
        }
    }
    s
}

impl LogViewerScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState, session: &SessionView) {
        let show_filter_bar = state.ui_state.search_active
            || state.ui_state.active_filter.is_some()
            || state.ui_state.filter_error.is_some();

        let (header_area, filter_area, logs_area, status_area) =
            Layout::log_viewer(frame.area(), show_filter_bar);

        Self::render_header(frame, header_area, state, session);
        if let Some(area) = filter_area {
            Self::render_filter_bar(frame, area, state);
        }
        Self::render_logs(frame, logs_area, state, session);
        Self::render_status_bar(frame, status_area, state, session);
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState, session: &SessionView) {
        let name = if session.target.source_name.is_empty() {
            "no log selected"
        } else {
            session.target.source_name.as_str()
        };
        let host = if session.target.host.is_empty() {
            state.host.as_str()
        } else {
            session.target.host.as_str()
        };

        let mut spans = vec![
            Span::styled("hoihoi", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(name, Theme::text_highlight()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(host, Theme::text()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(
                format!("● {}", session.status.label()),
                Theme::session_status(session.status),
            ),
        ];

        if let Some(err) = &session.last_error {
            spans.push(Span::styled(" │ ", Theme::text_dim()));
            spans.push(Span::styled(err.clone(), Theme::error()));
        }

        let header = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_filter_bar(frame: &mut Frame, area: Rect, state: &AppState) {
        let mut spans = vec![];

        if state.ui_state.search_active {
            spans.push(Span::styled(
                " /",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled(" Filter: ", Theme::text_dim()));
        }

        let pattern = if state.ui_state.search_active {
            &state.ui_state.search_input
        } else if let Some(filter) = &state.ui_state.active_filter {
            filter.pattern()
        } else {
            ""
        };
        spans.push(Span::styled(pattern.to_string(), Theme::text_highlight()));

        if state.ui_state.search_active {
            spans.push(Span::styled(
                "█",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::SLOW_BLINK),
            ));
        }

        if let Some(err) = &state.ui_state.filter_error {
            spans.push(Span::styled(" ", Theme::text()));
            spans.push(Span::styled(
                format!("⚠ {}", err),
                Style::default().fg(Color::Red),
            ));
        }

        if state.ui_state.search_active {
            spans.push(Span::styled(
                "  [Enter] Apply  [Esc] Cancel",
                Theme::text_dim(),
            ));
        } else if state.ui_state.active_filter.is_some() {
            spans.push(Span::styled("  [n] Clear  [/] Edit", Theme::text_dim()));
        }

        let filter_bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(if state.ui_state.search_active {
                    Style::default().fg(Color::Yellow)
                } else if state.ui_state.filter_error.is_some() {
                    Style::default().fg(Color::Red)
                } else {
                    Theme::border()
                })
                .title(Span::styled(" Filter ", Theme::title())),
        );

        frame.render_widget(filter_bar, area);
    }

    fn render_logs(frame: &mut Frame, area: Rect, state: &mut AppState, session: &SessionView) {
        let buffer = session.buffer;
        // Visible area inside the border
        let inner_height = area.height.saturating_sub(2) as usize;
        let inner_width = area.width.saturating_sub(4) as usize; // borders + scrollbar

        state.refresh_projection(buffer);
        state.set_viewport_height(inner_height);

        let total = state.visible_lines().len();
        let scroll = state.ui_state.log_scroll;
        let max_scroll = state.max_scroll();

        let strategy = choose_render_strategy(total, state.view.window_threshold);
        let viewport = Viewport::rows(scroll, inner_height, state.view.overscan);
        let rows = rows_to_render(strategy, &viewport, total);
        let row_offset = scroll.saturating_sub(rows.start);

        let filter = state.ui_state.active_filter.as_ref();
        let show_source = state.ui_state.show_source_names;
        let lines: Vec<Line> = state.visible_lines()[rows.clone()]
            .iter()
            .enumerate()
            .map(|(i, line)| format_log_line(rows.start + i, line, filter, show_source, inner_width))
            .collect();

        let title = if state.ui_state.active_filter.is_some() {
            format!(" Logs ({} of {} matching) ", total, buffer.len())
        } else {
            format!(" Logs ({}) ", total)
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border())
            .title(Span::styled(title, Theme::title()));

        if total == 0 {
            let hint = if !buffer.is_empty() {
                "No lines match the filter."
            } else if session.can_start() {
                "No lines yet. Press [s] to start tailing."
            } else {
                "No log selected. Press [o] to pick one."
            };
            let empty = Paragraph::new(Line::from(Span::styled(hint, Theme::text_dim()))).block(block);
            frame.render_widget(empty, area);
            return;
        }

        let offset = u16::try_from(row_offset).unwrap_or(u16::MAX);
        let logs_widget = Paragraph::new(lines).block(block).scroll((offset, 0));
        frame.render_widget(logs_widget, area);

        if total > inner_height {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));

            let mut scrollbar_state = ScrollbarState::default()
                .content_length(max_scroll)
                .position(scroll.min(max_scroll));

            frame.render_stateful_widget(
                scrollbar,
                area.inner(Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, session: &SessionView) {
        let capacity = match session.buffer.capacity() {
            Some(cap) => format!("/{}", cap),
            None => String::new(),
        };
        let right = format!(
            "{}{} lines {}",
            session.buffer.len(),
            capacity,
            if state.ui_state.auto_scroll { "▼" } else { " " }
        );

        let status = StatusBar::new()
            .hints(log_viewer_hints(session.running, session.can_start()))
            .notice(state.ui_state.notice.as_ref())
            .right(right);

        frame.render_widget(status, area);
    }
}

/// One rendered row: row number, optional source name, text with filter matches highlighted
fn format_log_line(
    index: usize,
    line: &LogLine,
    filter: Option<&TextFilter>,
    show_source: bool,
    available_width: usize,
) -> Line<'static> {
    let mut spans = Vec::new();
    let mut prefix_width = 0;

    let number = format!("{:>6} ", index + 1);
    prefix_width += number.width();
    spans.push(Span::styled(number, Theme::text_dim()));

    if show_source {
        let source = format!("{} │ ", line.source_name);
        prefix_width += source.width();
        spans.push(Span::styled(
            source,
            Style::default().fg(source_color(&line.source_name)),
        ));
    }

    let text_width = available_width.saturating_sub(prefix_width);
    let display = truncate_to_width(&line.text, text_width);

    let matches = filter.map(|f| f.find_matches(display)).unwrap_or_default();
    let mut last_end = 0;
    for (start, end) in matches {
        if start > last_end {
            spans.push(Span::styled(display[last_end..start].to_string(), Theme::text()));
        }
        spans.push(Span::styled(display[start..end].to_string(), Theme::text_match()));
        last_end = end;
    }
    if last_end < display.len() {
        spans.push(Span::styled(display[last_end..].to_string(), Theme::text()));
    }

    Line::from(spans)
}

/// Stable color per source name
fn source_color(name: &str) -> Color {
    let hash: u32 = name.bytes().fold(0u32, |acc, b| acc.wrapping_add(b as u32));

    let colors = [
        Color::Cyan,
        Color::Magenta,
        Color::Blue,
        Color::Yellow,
        Color::Green,
        Color::LightCyan,
        Color::LightMagenta,
    ];

    colors[(hash as usize) % colors.len()]
}
