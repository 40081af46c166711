use regex::{Regex, RegexBuilder};

use hoihoi_types::{LogLine, SharedLogLine};

use crate::buffer::{BufferCursor, BufferDelta, LogBuffer};

/// Compiled case-insensitive substring filter
#[derive(Clone)]
pub struct TextFilter {
    /// Escaped pattern (None for an empty filter)
    regex: Option<Regex>,

    /// Original filter text
    pattern: String,
}

impl TextFilter {
    /// Create a new filter from free text
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = if pattern.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&regex::escape(pattern))
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self {
            regex,
            pattern: pattern.to_string(),
        })
    }

    /// Check if a line matches this filter
    pub fn matches(&self, line: &LogLine) -> bool {
        self.matches_text(&line.text)
    }

    pub fn matches_text(&self, text: &str) -> bool {
        match &self.regex {
            Some(re) => re.is_match(text),
            None => true,
        }
    }

    /// Find all match positions in a string (for highlighting)
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        match &self.regex {
            Some(re) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            None => Vec::new(),
        }
    }

    /// Get the original pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Check if filter is empty (matches everything)
    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }
}

impl std::fmt::Debug for TextFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextFilter")
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// Visible subset of `lines` for `filter_text`, in original order
///
/// Empty filter text returns every line.
pub fn project(lines: &[SharedLogLine], filter_text: &str) -> Vec<SharedLogLine> {
    if filter_text.is_empty() {
        return lines.to_vec();
    }

    match TextFilter::new(filter_text) {
        Ok(filter) => project_with(lines, &filter),
        Err(_) => {
            // Only reachable for patterns past the regex size limit
            let needle = filter_text.to_lowercase();
            lines
                .iter()
                .filter(|l| l.text.to_lowercase().contains(&needle))
                .cloned()
                .collect()
        }
    }
}

/// Same as [`project`] with an already compiled filter
pub fn project_with(lines: &[SharedLogLine], filter: &TextFilter) -> Vec<SharedLogLine> {
    if filter.is_empty() {
        return lines.to_vec();
    }
    lines.iter().filter(|l| filter.matches(l)).cloned().collect()
}

/// What [`Projection::refresh`] had to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refresh {
    Unchanged,
    /// New buffer lines were filtered and appended
    Extended(usize),
    /// Recomputed from a full snapshot
    Rebuilt,
}

/// Visible lines of a [`LogBuffer`] under a filter, kept current incrementally
///
/// Pushes only filter the new lines. A clear, an eviction or a filter change
/// recomputes from a snapshot.
#[derive(Debug, Default)]
pub struct Projection {
    /// Pattern the lines were filtered with (None = no filter)
    pattern: Option<String>,
    cursor: Option<BufferCursor>,
    lines: Vec<SharedLogLine>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the visible lines up to date with `buffer` and `filter`
    pub fn refresh(&mut self, buffer: &LogBuffer, filter: Option<&TextFilter>) -> Refresh {
        let pattern = filter.map(|f| f.pattern()).filter(|p| !p.is_empty());
        if self.pattern.as_deref() != pattern {
            self.pattern = pattern.map(str::to_string);
            self.cursor = None;
        }

        let (delta, cursor) = buffer.read_since(self.cursor);
        self.cursor = Some(cursor);

        let keep = |lines: Vec<SharedLogLine>| match filter {
            Some(filter) => project_with(&lines, filter),
            None => lines,
        };

        match delta {
            BufferDelta::Appended(lines) if lines.is_empty() => Refresh::Unchanged,
            BufferDelta::Appended(lines) => {
                let added = lines.len();
                self.lines.extend(keep(lines));
                Refresh::Extended(added)
            }
            BufferDelta::Snapshot(lines) => {
                self.lines = keep(lines);
                Refresh::Rebuilt
            }
        }
    }

    /// Lines passing the filter, in receipt order
    pub fn lines(&self) -> &[SharedLogLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn lines(texts: &[&str]) -> Vec<SharedLogLine> {
        texts
            .iter()
            .map(|t| Arc::new(LogLine::new("genesis", *t)))
            .collect()
    }

    fn texts(lines: &[SharedLogLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_empty_filter_is_identity() {
        let buffer = lines(&["A", "B", "C"]);
        assert_eq!(project(&buffer, ""), buffer);
    }

    #[test]
    fn test_filter_selects_single_line() {
        let buffer = lines(&["A", "B", "C"]);
        let visible = project(&buffer, "B");
        assert_eq!(visible.len(), 1);
        assert_eq!(*visible[0], LogLine::new("genesis", "B"));
    }

    #[test]
    fn test_filter_is_case_insensitive_and_ordered() {
        let buffer = lines(&[
            "Genesis started",
            "stargate ready",
            "GENESIS leader changed",
            "genesis rpc error",
        ]);
        let visible = project(&buffer, "genesis");
        assert_eq!(
            texts(&visible),
            vec!["Genesis started", "GENESIS leader changed", "genesis rpc error"]
        );
    }

    #[test]
    fn test_filter_is_idempotent() {
        let buffer = lines(&["error: disk", "ok", "ERROR: net", "fine"]);
        let once = project(&buffer, "error");
        let twice = project(&once, "error");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_metacharacters_match_literally() {
        let buffer = lines(&["a.b", "axb", "[x]", "(y)"]);
        assert_eq!(texts(&project(&buffer, "a.b")), vec!["a.b"]);
        assert_eq!(texts(&project(&buffer, "[x]")), vec!["[x]"]);
        assert_eq!(texts(&project(&buffer, "(")), vec!["(y)"]);
    }

    #[test]
    fn test_projection_does_not_touch_input() {
        let buffer = lines(&["A", "B"]);
        let _ = project(&buffer, "zzz");
        assert_eq!(texts(&buffer), vec!["A", "B"]);
    }

    fn genesis_buffer(texts: &[&str]) -> LogBuffer {
        texts.iter().map(|t| LogLine::new("genesis", *t)).collect()
    }

    #[test]
    fn test_projection_extends_on_push() {
        let buffer = genesis_buffer(&["disk error", "ok"]);
        let filter = TextFilter::new("ERROR").unwrap();
        let mut projection = Projection::new();

        assert_eq!(projection.refresh(&buffer, Some(&filter)), Refresh::Rebuilt);
        assert_eq!(texts(projection.lines()), vec!["disk error"]);
        assert_eq!(projection.refresh(&buffer, Some(&filter)), Refresh::Unchanged);

        buffer.push(LogLine::new("genesis", "net error"));
        buffer.push(LogLine::new("genesis", "fine"));
        assert_eq!(projection.refresh(&buffer, Some(&filter)), Refresh::Extended(2));
        assert_eq!(texts(projection.lines()), vec!["disk error", "net error"]);
        assert_eq!(projection.lines(), project(&buffer.all(), "error").as_slice());
    }

    #[test]
    fn test_projection_rebuilds_on_filter_change_and_clear() {
        let buffer = genesis_buffer(&["A", "B", "C"]);
        let mut projection = Projection::new();
        projection.refresh(&buffer, None);
        assert_eq!(projection.len(), 3);

        let filter = TextFilter::new("b").unwrap();
        assert_eq!(projection.refresh(&buffer, Some(&filter)), Refresh::Rebuilt);
        assert_eq!(texts(projection.lines()), vec!["B"]);

        assert_eq!(projection.refresh(&buffer, None), Refresh::Rebuilt);
        assert_eq!(projection.len(), 3);

        buffer.clear();
        assert_eq!(projection.refresh(&buffer, None), Refresh::Rebuilt);
        assert!(projection.is_empty());
    }

    #[test]
    fn test_projection_rebuilds_after_eviction() {
        let buffer = LogBuffer::new(Some(2));
        buffer.push(LogLine::new("genesis", "A"));
        let mut projection = Projection::new();
        projection.refresh(&buffer, None);

        buffer.push(LogLine::new("genesis", "B"));
        buffer.push(LogLine::new("genesis", "C"));
        assert_eq!(projection.refresh(&buffer, None), Refresh::Rebuilt);
        assert_eq!(texts(projection.lines()), vec!["B", "C"]);
    }

    #[test]
    fn test_find_matches() {
        let filter = TextFilter::new("error").unwrap();
        let matches = filter.find_matches("an Error occurred, another ERROR here");
        assert_eq!(matches, vec![(3, 8), (27, 32)]);
    }
}
