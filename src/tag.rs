use crate::hash::{format_anchor, line_hash, BLANK_MARKER};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Duplicate-visibility policy for tagged reads
///
/// The two policies are mutually exclusive per read; `MarkAll` is the
/// default. Under `MarkAll` every non-empty line shows its anchor even when
/// duplicated, and disambiguation is deferred to edit time (offset or
/// context input to the resolver). Under `FirstOccurrence` only the first
/// line with a given hash shows it, scanning from the start of the file
/// rather than the start of the visible window, so every visible anchor is
/// unique by construction but later duplicates cannot be targeted until a
/// different range is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagPolicy {
    #[default]
    MarkAll,
    FirstOccurrence,
}

/// One annotated line of a tagged read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedLine {
    /// 1-indexed line number within the snapshot
    pub number: usize,
    /// Anchor value, or None for empty lines and policy-hidden duplicates
    pub anchor: Option<u16>,
    /// Raw line text
    pub text: String,
}

impl TaggedLine {
    /// Render as `XX|text`, with the blank marker in the anchor column
    /// when the line carries no anchor
    pub fn render(&self) -> String {
        match self.anchor {
            Some(value) => format!("{}|{}", format_anchor(value), self.text),
            None => format!("{}|{}", BLANK_MARKER, self.text),
        }
    }
}

/// Tag a window of a snapshot's lines under the given policy
///
/// `start` is the 1-indexed first line of the window and `count` its
/// length; the window is clamped to the snapshot. For `FirstOccurrence`,
/// duplicate detection is seeded from every line before the window, so a
/// ranged read agrees with a whole-file read about which occurrence of a
/// duplicated line owns the anchor.
///
/// Empty lines always render the blank marker, never a hash, so "no
/// content" can never be confused with a valid hash collision.
pub fn tag_window(snapshot: &Snapshot, start: usize, count: usize, policy: TagPolicy) -> Vec<TaggedLine> {
    let start = start.max(1);
    if start > snapshot.len() {
        return Vec::new();
    }
    let end = (start - 1).saturating_add(count).min(snapshot.len());

    let mut seen: HashSet<u16> = HashSet::new();
    if policy == TagPolicy::FirstOccurrence {
        for text in &snapshot.lines[..start - 1] {
            if !text.is_empty() {
                seen.insert(line_hash(text));
            }
        }
    }

    let mut out = Vec::with_capacity(end - (start - 1));
    for (idx, text) in snapshot.lines[start - 1..end].iter().enumerate() {
        let number = start + idx;
        let anchor = if text.is_empty() {
            None
        } else {
            let value = line_hash(text);
            match policy {
                TagPolicy::MarkAll => Some(value),
                TagPolicy::FirstOccurrence => {
                    if seen.insert(value) {
                        Some(value)
                    } else {
                        None
                    }
                }
            }
        };
        out.push(TaggedLine {
            number,
            anchor,
            text: text.clone(),
        });
    }
    out
}

/// Tag every line of a snapshot
pub fn tag_snapshot(snapshot: &Snapshot, policy: TagPolicy) -> Vec<TaggedLine> {
    tag_window(snapshot, 1, snapshot.len(), policy)
}

/// Join tagged lines into the block form returned to the caller
pub fn render_tagged(lines: &[TaggedLine]) -> String {
    let rendered: Vec<String> = lines.iter().map(TaggedLine::render).collect();
    rendered.join("\n")
}
