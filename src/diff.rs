use serde::{Deserialize, Serialize};

/// Context radius: unchanged rows kept on each side of a change
pub const CONTEXT_RADIUS: usize = 4;

/// Minimum width of the rendered line-number column
const MIN_NUMBER_WIDTH: usize = 3;

/// Classification of a diff row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Line exists in both old and new content
    Context,
    /// Line exists only in the old content
    Removed,
    /// Line exists only in the new content
    Added,
}

/// A single classified diff row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub kind: DiffKind,
    /// Old-file line number (None for added rows)
    pub old_line: Option<usize>,
    /// New-file line number (None for removed rows)
    pub new_line: Option<usize>,
    /// Row text without the leading diff marker
    pub text: String,
}

/// A row of the windowed report: a kept diff entry, or the marker standing
/// in for a collapsed untouched run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportRow {
    Entry(DiffEntry),
    Ellipsis,
}

/// Bounded, line-numbered change report built from a raw unified diff
///
/// The report size depends on the number of changes, never on file length:
/// a one-line change in a 10,000-line file keeps at most the change row
/// plus `CONTEXT_RADIUS` context rows on each side, with larger untouched
/// runs collapsed into ellipsis markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    pub rows: Vec<ReportRow>,
    /// Lowest line number touched by any removed (old numbering) or added
    /// (new numbering) row; None when nothing changed
    pub first_changed_line: Option<usize>,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl DiffReport {
    /// Parse a raw unified diff and window it to the default radius
    pub fn from_unified(raw: &str) -> DiffReport {
        DiffReport::from_unified_with_radius(raw, CONTEXT_RADIUS)
    }

    /// Parse a raw unified diff and window it to the given radius
    pub fn from_unified_with_radius(raw: &str, radius: usize) -> DiffReport {
        let hunks = parse_unified(raw);

        let mut rows = Vec::new();
        let mut first_changed_line: Option<usize> = None;
        let mut lines_added = 0;
        let mut lines_removed = 0;

        for hunk in &hunks {
            let kept = window_hunk(hunk, radius);
            if kept.iter().all(|row| matches!(row, ReportRow::Ellipsis)) {
                continue;
            }
            if !rows.is_empty() {
                rows.push(ReportRow::Ellipsis);
            }
            rows.extend(kept);
        }

        for hunk in &hunks {
            for entry in hunk {
                let touched = match entry.kind {
                    DiffKind::Removed => {
                        lines_removed += 1;
                        entry.old_line
                    }
                    DiffKind::Added => {
                        lines_added += 1;
                        entry.new_line
                    }
                    DiffKind::Context => None,
                };
                if let Some(line) = touched {
                    first_changed_line =
                        Some(first_changed_line.map_or(line, |current| current.min(line)));
                }
            }
        }

        if first_changed_line.is_none() {
            // Byte-identical before/after: report no changes, emit nothing.
            rows.clear();
        }

        DiffReport {
            rows,
            first_changed_line,
            lines_added,
            lines_removed,
        }
    }

    /// True when the before and after content were identical
    pub fn is_empty(&self) -> bool {
        self.first_changed_line.is_none()
    }

    /// Render the report with right-aligned line numbers
    ///
    /// The number column is sized to the largest number appearing in the
    /// report, never narrower than three characters. Removed rows show the
    /// old-file number; context and added rows show the new-file number.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "No changes".to_string();
        }

        let max_number = self
            .rows
            .iter()
            .filter_map(|row| match row {
                ReportRow::Entry(entry) => entry.old_line.max(entry.new_line),
                ReportRow::Ellipsis => None,
            })
            .max()
            .unwrap_or(0);
        let width = MIN_NUMBER_WIDTH.max(decimal_width(max_number));

        let mut out = String::new();
        for row in &self.rows {
            match row {
                ReportRow::Entry(entry) => {
                    let (number, sign) = match entry.kind {
                        DiffKind::Context => (entry.new_line.unwrap_or(0), ' '),
                        DiffKind::Removed => (entry.old_line.unwrap_or(0), '-'),
                        DiffKind::Added => (entry.new_line.unwrap_or(0), '+'),
                    };
                    out.push_str(&format!("{:>width$} {} {}\n", number, sign, entry.text));
                }
                ReportRow::Ellipsis => {
                    out.push_str(&format!("{:>width$}\n", "..."));
                }
            }
        }
        out
    }
}

fn decimal_width(mut value: usize) -> usize {
    let mut width = 1;
    while value >= 10 {
        value /= 10;
        width += 1;
    }
    width
}

/// Parse raw unified diff text into per-hunk classified rows
///
/// Independent old-line and new-line counters are reset by each hunk
/// header and advanced per row: context advances both, removed advances
/// the old counter only, added the new counter only. File headers and
/// `\ No newline at end of file` markers are skipped.
fn parse_unified(raw: &str) -> Vec<Vec<DiffEntry>> {
    let mut hunks: Vec<Vec<DiffEntry>> = Vec::new();
    let mut current: Option<Vec<DiffEntry>> = None;
    let mut old_line = 0usize;
    let mut new_line = 0usize;

    for line in raw.lines() {
        if let Some(header) = line.strip_prefix("@@") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            let (old_start, new_start) = parse_hunk_header(header);
            old_line = old_start;
            new_line = new_start;
            current = Some(Vec::new());
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            // Preamble: ---/+++ file headers or executor chatter.
            continue;
        };

        if line.starts_with('\\') {
            continue;
        }

        if let Some(text) = line.strip_prefix('-') {
            hunk.push(DiffEntry {
                kind: DiffKind::Removed,
                old_line: Some(old_line),
                new_line: None,
                text: text.to_string(),
            });
            old_line += 1;
        } else if let Some(text) = line.strip_prefix('+') {
            hunk.push(DiffEntry {
                kind: DiffKind::Added,
                old_line: None,
                new_line: Some(new_line),
                text: text.to_string(),
            });
            new_line += 1;
        } else {
            let text = line.strip_prefix(' ').unwrap_or(line);
            hunk.push(DiffEntry {
                kind: DiffKind::Context,
                old_line: Some(old_line),
                new_line: Some(new_line),
                text: text.to_string(),
            });
            old_line += 1;
            new_line += 1;
        }
    }

    if let Some(hunk) = current.take() {
        hunks.push(hunk);
    }
    hunks
}

/// Parse `@@ -a,b +c,d @@` trailer into the starting old/new line numbers
///
/// A zero start (empty-side hunk, e.g. file creation) is bumped to 1 so
/// counters stay 1-indexed.
fn parse_hunk_header(header: &str) -> (usize, usize) {
    let mut old_start = 1;
    let mut new_start = 1;
    for token in header.split_whitespace() {
        if let Some(spec) = token.strip_prefix('-') {
            old_start = parse_start(spec);
        } else if let Some(spec) = token.strip_prefix('+') {
            new_start = parse_start(spec);
        }
    }
    (old_start, new_start)
}

fn parse_start(spec: &str) -> usize {
    let number = spec.split(',').next().unwrap_or("1");
    number.parse::<usize>().unwrap_or(1).max(1)
}

/// Keep rows within `radius` of any changed row; collapse every larger
/// untouched run into a single ellipsis marker
fn window_hunk(hunk: &[DiffEntry], radius: usize) -> Vec<ReportRow> {
    let changed: Vec<usize> = hunk
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.kind != DiffKind::Context)
        .map(|(idx, _)| idx)
        .collect();
    if changed.is_empty() {
        return vec![ReportRow::Ellipsis];
    }

    let mut rows = Vec::new();
    let mut dropping = false;
    for (idx, entry) in hunk.iter().enumerate() {
        let near_change = changed.iter().any(|c| idx.abs_diff(*c) <= radius);
        if near_change {
            rows.push(ReportRow::Entry(entry.clone()));
            dropping = false;
        } else if !dropping {
            rows.push(ReportRow::Ellipsis);
            dropping = true;
        }
    }
    rows
}
