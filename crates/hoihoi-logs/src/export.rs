use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use hoihoi_types::SharedLogLine;

/// File name prefix used when no source name is known
pub const DEFAULT_EXPORT_PREFIX: &str = "realtimelog";

/// Line layout of an exported file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportVariant {
    /// "{source_name} {text}" per line
    Annotated,
    /// "{text}" per line
    Plain,
}

impl ExportVariant {
    /// Annotate only when lines from several sources are interleaved
    pub fn for_lines(lines: &[SharedLogLine]) -> Self {
        let sources: HashSet<&str> = lines.iter().map(|l| l.source_name.as_str()).collect();
        if sources.len() > 1 {
            Self::Annotated
        } else {
            Self::Plain
        }
    }
}

/// Result of a successful export
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub lines: usize,
    pub variant: ExportVariant,
}

/// Join lines into the export text (newline separated, no trailing newline)
pub fn serialize(lines: &[SharedLogLine], variant: ExportVariant) -> String {
    let rendered: Vec<String> = match variant {
        ExportVariant::Annotated => lines
            .iter()
            .map(|l| format!("{} {}", l.source_name, l.text))
            .collect(),
        ExportVariant::Plain => lines.iter().map(|l| l.text.clone()).collect(),
    };
    rendered.join("\n")
}

/// `{prefix}_{YYYYMMDD}-{HHMMSS}.txt` for the given wall-clock time
pub fn build_file_name(prefix: &str, now: NaiveDateTime) -> String {
    let prefix = sanitize_prefix(prefix);
    format!("{}_{}.txt", prefix, now.format("%Y%m%d-%H%M%S"))
}

/// Write `lines` to a timestamped file under `dir`
pub fn write_export(
    dir: &Path,
    prefix: &str,
    lines: &[SharedLogLine],
    now: NaiveDateTime,
) -> io::Result<ExportSummary> {
    let variant = ExportVariant::for_lines(lines);
    let path = dir.join(build_file_name(prefix, now));

    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&path, serialize(lines, variant))?;

    tracing::info!(path = %path.display(), lines = lines.len(), "exported logs");

    Ok(ExportSummary {
        path,
        lines: lines.len(),
        variant,
    })
}

/// Keep the prefix a single path component
fn sanitize_prefix(prefix: &str) -> String {
    let cleaned: String = prefix
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        DEFAULT_EXPORT_PREFIX.to_string()
    } else {
        cleaned
    }
}
