//! Line-oriented snapshot diffing.
//!
//! Markup is compared as plain text lines, never as a DOM. Whitespace and
//! attribute-order changes therefore show up as differences; the summarizer
//! prompt is written against this unified-diff input.

use similar::{ChangeTag, DiffOp, TextDiff};
use std::fmt;
use std::ops::Range;

pub const NO_BASELINE: &str = "No previous snapshot available.";

pub const NO_CHANGE: &str = "No major changes detected.";

const CONTEXT_LINES: usize = 3;

/// Result of comparing a fresh snapshot against the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlDiff {
    /// There was nothing to compare against
    NoBaseline,
    /// Both versions have identical lines
    Unchanged,
    /// Unified diff text
    Changed(String),
}

impl HtmlDiff {
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoBaseline => NO_BASELINE,
            Self::Unchanged => NO_CHANGE,
            Self::Changed(text) => text,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

impl fmt::Display for HtmlDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compare the last stored markup (if any) with a freshly fetched version.
/// Empty old markup counts as no baseline.
pub fn diff(old: Option<&str>, new: &str) -> HtmlDiff {
    let Some(old) = old.filter(|o| !o.is_empty()) else {
        return HtmlDiff::NoBaseline;
    };

    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    if old_lines == new_lines {
        return HtmlDiff::Unchanged;
    }

    let text_diff = TextDiff::from_slices(old_lines.as_slice(), new_lines.as_slice());
    let groups = text_diff.grouped_ops(CONTEXT_LINES);
    if groups.is_empty() {
        return HtmlDiff::Unchanged;
    }

    let mut out: Vec<String> = vec!["--- ".to_string(), "+++ ".to_string()];
    for group in &groups {
        out.push(hunk_header(group));
        for op in group {
            for change in text_diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Equal => ' ',
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                };
                out.push(format!("{}{}", sign, change.value()));
            }
        }
    }

    HtmlDiff::Changed(out.join("\n"))
}

/// Split on `\n`, `\r\n`, and a lone `\r`. A trailing terminator does not
/// start an extra empty line.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find(|c: char| c == '\n' || c == '\r') {
        lines.push(&rest[..idx]);
        let terminator = if rest[idx..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[idx + terminator..];
    }
    if !rest.is_empty() {
        lines.push(rest);
    }
    lines
}

fn hunk_header(group: &[DiffOp]) -> String {
    let (Some(first), Some(last)) = (group.first(), group.last()) else {
        return "@@ -0,0 +0,0 @@".to_string();
    };
    let old = first.old_range().start..last.old_range().end;
    let new = first.new_range().start..last.new_range().end;
    format!("@@ -{} +{} @@", unified_range(&old), unified_range(&new))
}

/// `start,len` with 1-based start; a single line drops the length and an
/// empty range points at the line before it.
fn unified_range(range: &Range<usize>) -> String {
    let len = range.end - range.start;
    match len {
        0 => format!("{},0", range.start),
        1 => format!("{}", range.start + 1),
        _ => format!("{},{}", range.start + 1, len),
    }
}

/// First `max_chars` characters of a diff for log output.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
