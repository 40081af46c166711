use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::{
    app::AppState,
    ui::{
        Layout, Theme,
        components::{ListRow, ListSelector, StatusBar, list_nav_hints},
    },
};

/// Log file picker
pub struct TargetSelectScreen;

impl TargetSelectScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState) {
        let area = frame.area();
        let (header_area, content_area, status_area) = Layout::main(area);

        Self::render_header(frame, header_area, state);
        Self::render_list(frame, content_area, state);
        Self::render_status_bar(frame, status_area, state);
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
        let host = if state.host.is_empty() {
            "no host"
        } else {
            state.host.as_str()
        };

        let title = Line::from(vec![
            Span::styled("hoihoi", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(host, Theme::text_highlight()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled("Select Log", Theme::text()),
        ]);

        let header = Paragraph::new(title).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_list(frame: &mut Frame, area: Rect, state: &mut AppState) {
        let list_area = Layout::centered_list(area, 80);

        let rows = state.sources.iter().enumerate().map(|(i, source)| ListRow {
            label: source.name.as_str(),
            detail: source.path.as_str(),
            current: state.selected_source == Some(i),
        });
        let selector = ListSelector::new(" Log Files ").rows(rows);

        frame.render_stateful_widget(selector, list_area, &mut state.ui_state.list_state);
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState) {
        let count = format!("{} logs", state.sources.len());

        let status = StatusBar::new()
            .hints(list_nav_hints())
            .notice(state.ui_state.notice.as_ref())
            .right(count);

        frame.render_widget(status, area);
    }
}
