use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, StatefulWidget},
};
use unicode_width::UnicodeWidthStr;

use crate::ui::Theme;

/// One row of a [`ListSelector`]
pub struct ListRow<'a> {
    pub label: &'a str,
    /// Dimmed second column
    pub detail: &'a str,
    /// Marked as the active choice
    pub current: bool,
}

/// Two-column selectable list with the labels aligned
pub struct ListSelector<'a> {
    rows: Vec<ListRow<'a>>,
    title: &'a str,
}

impl<'a> ListSelector<'a> {
    pub fn new(title: &'a str) -> Self {
        Self {
            rows: Vec::new(),
            title,
        }
    }

    pub fn rows<I>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = ListRow<'a>>,
    {
        self.rows = rows.into_iter().collect();
        self
    }

    fn items(&self) -> Vec<ListItem<'a>> {
        let label_width = self.rows.iter().map(|r| r.label.width()).max().unwrap_or(0);

        self.rows
            .iter()
            .map(|row| {
                let marker = if row.current { "● " } else { "  " };
                let label_style = if row.current {
                    Theme::list_item_current()
                } else {
                    Theme::list_item()
                };
                let padding = " ".repeat(label_width - row.label.width() + 2);

                ListItem::new(Line::from(vec![
                    Span::styled(marker, Theme::list_item_current()),
                    Span::styled(row.label, label_style),
                    Span::raw(padding),
                    Span::styled(row.detail, Theme::text_dim()),
                ]))
            })
            .collect()
    }
}

impl StatefulWidget for ListSelector<'_> {
    type State = ListState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border_focused())
            .title(Span::styled(self.title, Theme::title()));

        let list = List::new(self.items())
            .block(block)
            .highlight_style(Theme::list_item_selected())
            .highlight_symbol("▶ ");

        StatefulWidget::render(list, area, buf, state);
    }
}
