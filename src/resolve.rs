use crate::hash::{format_anchor, line_hash};
use crate::snapshot::Snapshot;
use log::debug;

/// Optional input accompanying an anchor to break ties among multiple
/// candidate lines sharing that anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disambiguator {
    /// Line number to begin searching from: the first candidate at or
    /// after this line wins
    Offset(usize),
    /// Another anchor believed unique nearby: the candidate closest to it
    /// wins, lowest line number on an equal-distance tie
    Context(u16),
}

/// A successful resolution
///
/// `ambiguous` is set when multiple candidates existed and no
/// disambiguator was supplied: the first candidate is returned, but the
/// caller must surface the result as a warning, never as a confident hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Authoritative 1-indexed line number in the snapshot
    pub line: usize,
    /// True when the pick was first-of-many rather than unique
    pub ambiguous: bool,
}

/// Classified resolution failures
///
/// Every failure here is detected strictly before any mutation is
/// dispatched; a partially-resolved edit never touches the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Anchor absent from the current snapshot; remedy: re-read the file
    StaleAnchor { anchor: u16 },
    /// Multiple candidates and the caller demanded exactly one
    AmbiguousAnchor { anchor: u16, candidates: Vec<usize> },
    /// The context disambiguator itself does not resolve uniquely
    AmbiguousContext { anchor: u16, candidates: Vec<usize> },
    /// The resolved stop line precedes the resolved start line
    InvalidRange { start: usize, stop: usize },
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::StaleAnchor { anchor } => {
                write!(
                    f,
                    "Anchor '{}' not found in the current file; re-read the file before editing",
                    format_anchor(*anchor)
                )
            }
            ResolveError::AmbiguousAnchor { anchor, candidates } => {
                write!(
                    f,
                    "Anchor '{}' matches {} lines ({:?}); supply an offset or context anchor",
                    format_anchor(*anchor),
                    candidates.len(),
                    candidates
                )
            }
            ResolveError::AmbiguousContext { anchor, candidates } => {
                write!(
                    f,
                    "Context anchor '{}' is itself ambiguous ({} candidate lines: {:?})",
                    format_anchor(*anchor),
                    candidates.len(),
                    candidates
                )
            }
            ResolveError::InvalidRange { start, stop } => {
                write!(
                    f,
                    "Invalid range: stop line {} precedes start line {}",
                    stop, start
                )
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Collect the 1-indexed numbers of every line whose hash equals `anchor`
///
/// Empty lines never participate: they render the blank marker on the read
/// path and are excluded here symmetrically.
fn candidates(snapshot: &Snapshot, anchor: u16) -> Vec<usize> {
    snapshot
        .lines
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.is_empty() && line_hash(text) == anchor)
        .map(|(idx, _)| idx + 1)
        .collect()
}

/// Resolve an anchor to an authoritative line number
///
/// Zero candidates fail as `StaleAnchor`. A single candidate is returned
/// directly. Multiple candidates are disambiguated by the supplied
/// strategy; with no disambiguator the first candidate is returned flagged
/// ambiguous so the caller can warn instead of silently guessing.
pub fn resolve(
    snapshot: &Snapshot,
    anchor: u16,
    disambiguator: Option<Disambiguator>,
) -> Result<Resolution, ResolveError> {
    let found = candidates(snapshot, anchor);

    match found.as_slice() {
        [] => Err(ResolveError::StaleAnchor { anchor }),
        [only] => Ok(Resolution {
            line: *only,
            ambiguous: false,
        }),
        many => match disambiguator {
            Some(Disambiguator::Offset(from)) => {
                let line = many
                    .iter()
                    .copied()
                    .find(|line| *line >= from)
                    .ok_or(ResolveError::StaleAnchor { anchor })?;
                Ok(Resolution {
                    line,
                    ambiguous: false,
                })
            }
            Some(Disambiguator::Context(context)) => {
                let context_line = resolve_context(snapshot, context)?;
                // Nearest candidate by absolute distance; scan order already
                // ascends, so on an equal-distance tie the lower line number
                // is kept.
                let mut best = many[0];
                let mut best_distance = best.abs_diff(context_line);
                for line in &many[1..] {
                    let distance = line.abs_diff(context_line);
                    if distance < best_distance {
                        best = *line;
                        best_distance = distance;
                    }
                }
                Ok(Resolution {
                    line: best,
                    ambiguous: false,
                })
            }
            None => {
                debug!(
                    "anchor '{}' matches lines {:?}; returning first and flagging ambiguous",
                    format_anchor(anchor),
                    many
                );
                Ok(Resolution {
                    line: many[0],
                    ambiguous: true,
                })
            }
        },
    }
}

/// Resolve an anchor demanding exactly one candidate
///
/// Used for context anchors and by hosts that treat ambiguity as a hard
/// failure rather than a warning.
pub fn resolve_unique(snapshot: &Snapshot, anchor: u16) -> Result<usize, ResolveError> {
    let found = candidates(snapshot, anchor);
    match found.as_slice() {
        [] => Err(ResolveError::StaleAnchor { anchor }),
        [only] => Ok(*only),
        _ => Err(ResolveError::AmbiguousAnchor {
            anchor,
            candidates: found,
        }),
    }
}

fn resolve_context(snapshot: &Snapshot, context: u16) -> Result<usize, ResolveError> {
    resolve_unique(snapshot, context).map_err(|err| match err {
        ResolveError::AmbiguousAnchor { anchor, candidates } => {
            ResolveError::AmbiguousContext { anchor, candidates }
        }
        other => other,
    })
}

/// Resolve a start/stop anchor pair to an inclusive line range
///
/// Stop resolution searches at or after the resolved start line, never
/// before it. A stop anchor whose only candidates precede the start fails
/// as `InvalidRange`; one with no candidates at all fails as `StaleAnchor`.
pub fn resolve_range(
    snapshot: &Snapshot,
    start_anchor: u16,
    disambiguator: Option<Disambiguator>,
    stop_anchor: u16,
) -> Result<(Resolution, usize), ResolveError> {
    let start = resolve(snapshot, start_anchor, disambiguator)?;

    let found = candidates(snapshot, stop_anchor);
    if found.is_empty() {
        return Err(ResolveError::StaleAnchor {
            anchor: stop_anchor,
        });
    }
    match found.iter().copied().find(|line| *line >= start.line) {
        Some(stop) => Ok((start, stop)),
        None => Err(ResolveError::InvalidRange {
            start: start.line,
            // All candidates precede the start; report the closest one.
            stop: *found.last().unwrap_or(&0),
        }),
    }
}
