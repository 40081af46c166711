//! Render strategy selection and scroll windowing
//!
//! Large projections are rendered windowed: only the rows intersecting the
//! viewport, plus an overscan margin, are materialized. Both strategies show
//! the same rows in the same order.

use std::ops::Range;

/// Line count above which rendering switches to [`RenderStrategy::Windowed`]
pub const DEFAULT_WINDOW_THRESHOLD: usize = 1000;

/// Largest usable threshold: direct rendering scrolls by a `u16` row offset
pub const MAX_WINDOW_THRESHOLD: usize = u16::MAX as usize;

/// Rows rendered above and below the viewport in windowed mode
pub const DEFAULT_OVERSCAN: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Every visible line becomes a row
    Direct,
    /// Only rows intersecting the viewport are rendered
    Windowed,
}

/// Pick a strategy for `len` visible lines
pub fn choose_render_strategy(len: usize, threshold: usize) -> RenderStrategy {
    if len > threshold {
        RenderStrategy::Windowed
    } else {
        RenderStrategy::Direct
    }
}

/// Scroll geometry, all in the same unit (terminal rows, pixels, ...)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub scroll_offset: usize,
    pub row_height: usize,
    pub height: usize,
    pub overscan: usize,
}

impl Viewport {
    /// Viewport measured in whole rows (row height 1)
    pub fn rows(scroll_offset: usize, height: usize, overscan: usize) -> Self {
        Self {
            scroll_offset,
            row_height: 1,
            height,
            overscan,
        }
    }
}

/// Index range of rows intersecting the viewport, widened by `overscan`
pub fn visible_range(
    scroll_offset: usize,
    row_height: usize,
    viewport_height: usize,
    overscan: usize,
    total: usize,
) -> Range<usize> {
    if total == 0 {
        return 0..0;
    }

    let row_height = row_height.max(1);
    let first = scroll_offset / row_height;
    let rows_in_view = viewport_height.div_ceil(row_height);

    let start = first.saturating_sub(overscan).min(total);
    let end = first
        .saturating_add(rows_in_view)
        .saturating_add(overscan)
        .min(total);

    start..end.max(start)
}

/// Rows a strategy materializes for this viewport
pub fn rows_to_render(strategy: RenderStrategy, viewport: &Viewport, total: usize) -> Range<usize> {
    match strategy {
        RenderStrategy::Direct => 0..total,
        RenderStrategy::Windowed => visible_range(
            viewport.scroll_offset,
            viewport.row_height,
            viewport.height,
            viewport.overscan,
            total,
        ),
    }
}

/// Largest scroll offset that still fills the viewport
pub fn max_scroll_offset(total: usize, row_height: usize, viewport_height: usize) -> usize {
    total
        .saturating_mul(row_height.max(1))
        .saturating_sub(viewport_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scroll a viewport through the whole list, collecting every row drawn
    fn render_in_full<'a>(strategy: RenderStrategy, items: &'a [String], height: usize) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut next = 0;
        let mut offset = 0;
        loop {
            let viewport = Viewport::rows(offset, height, DEFAULT_OVERSCAN);
            let range = rows_to_render(strategy, &viewport, items.len());
            for idx in range {
                if idx == next {
                    out.push(items[idx].as_str());
                    next += 1;
                }
            }
            if next >= items.len() || offset >= max_scroll_offset(items.len(), 1, height) {
                break;
            }
            offset += height;
        }
        out
    }

    #[test]
    fn test_strategy_threshold() {
        assert_eq!(choose_render_strategy(999, 1000), RenderStrategy::Direct);
        assert_eq!(choose_render_strategy(1000, 1000), RenderStrategy::Direct);
        assert_eq!(choose_render_strategy(1001, 1000), RenderStrategy::Windowed);
    }

    #[test]
    fn test_visible_range_with_overscan() {
        assert_eq!(visible_range(0, 20, 400, 5, 10_000), 0..25);
        assert_eq!(visible_range(2000, 20, 400, 5, 10_000), 95..125);
        assert_eq!(visible_range(199_800, 20, 400, 5, 10_000), 9985..10_000);
    }

    #[test]
    fn test_visible_range_edges() {
        assert_eq!(visible_range(0, 1, 30, 5, 0), 0..0);
        assert_eq!(visible_range(0, 1, 30, 5, 10), 0..10);
        assert_eq!(visible_range(500, 1, 30, 5, 10), 10..10);
        // partial row at the bottom still counts
        assert_eq!(visible_range(0, 20, 30, 0, 100), 0..2);
        // zero row height is treated as one
        assert_eq!(visible_range(3, 0, 2, 0, 100), 3..5);
    }

    #[test]
    fn test_windowed_and_direct_render_same_content() {
        let items: Vec<String> = (0..1500).map(|i| format!("line {}", i)).collect();
        let direct = render_in_full(RenderStrategy::Direct, &items, 40);
        let windowed = render_in_full(RenderStrategy::Windowed, &items, 40);
        assert_eq!(direct.len(), items.len());
        assert_eq!(direct, windowed);
    }

    #[test]
    fn test_windowed_covers_viewport() {
        let viewport = Viewport::rows(120, 30, 5);
        let range = rows_to_render(RenderStrategy::Windowed, &viewport, 5000);
        assert!(range.start <= 120);
        assert!(range.end >= 150);
        assert_eq!(range.len(), 40);
    }

    #[test]
    fn test_max_scroll_offset() {
        assert_eq!(max_scroll_offset(100, 1, 30), 70);
        assert_eq!(max_scroll_offset(10, 1, 30), 0);
        assert_eq!(max_scroll_offset(100, 20, 400), 1600);
    }
}
