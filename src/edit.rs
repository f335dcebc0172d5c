use crate::diff::DiffReport;
use crate::hash::{format_anchor, line_hash};
use crate::resolve::{resolve, resolve_range, Disambiguator, ResolveError};
use crate::snapshot::{read_snapshot, Snapshot, SnapshotError};
use log::debug;
use similar::{Algorithm, TextDiff};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default deadline handed to the mutation executor
pub const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Line-range operation handed to the mutation executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Create the file (or overwrite it) with the content verbatim
    Create,
    /// Insert the content before the given 1-indexed line
    InsertBefore { line: usize },
    /// Replace the inclusive 1-indexed line range with the content
    ReplaceRange { start: usize, stop: usize },
    /// Delete the inclusive 1-indexed line range
    DeleteRange { start: usize, stop: usize },
}

/// What the executor observed after performing a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Sentinel: no byte-level change occurred
    Unchanged,
    /// Raw unified before/after comparison text plus the checksum of the
    /// file as written
    Changed { diff: String, checksum: String },
}

/// Errors an executor may report; surfaced verbatim, never interpreted
#[derive(Debug)]
pub enum ExecutorError {
    Io(String),
    OutOfBounds {
        start: usize,
        stop: usize,
        len: usize,
    },
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorError::Io(e) => write!(f, "I/O failure: {}", e),
            ExecutorError::OutOfBounds { start, stop, len } => {
                write!(
                    f,
                    "Line range {}..{} out of bounds (file has {} lines)",
                    start, stop, len
                )
            }
        }
    }
}

impl std::error::Error for ExecutorError {}

/// External collaborator that performs the byte-level file change
///
/// Content travels as length-delimited bytes, never interpolated into a
/// textual command. Implementations honor `timeout` as a hard deadline
/// (the built-in in-process executor completes synchronously and has
/// nothing to bound). The return value is either the no-change sentinel or
/// the raw unified diff of what was written.
pub trait MutationExecutor {
    fn apply(
        &self,
        path: &str,
        kind: MutationKind,
        content: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<MutationOutcome, ExecutorError>;
}

/// Cooperative cancellation signal, checked immediately before dispatch
///
/// A cancellation that fires before dispatch aborts the request with no
/// file changes. Once dispatched, the mutation runs to completion so the
/// file is never left partially rewritten.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One anchor-addressed edit request, already parsed off the wire
#[derive(Debug, Clone, Default)]
pub struct EditSpec {
    /// Target path
    pub path: String,
    /// Absent start anchor means create/overwrite
    pub start_anchor: Option<u16>,
    /// Optional offset or context input for the start anchor
    pub disambiguator: Option<Disambiguator>,
    /// Optional stop anchor for a range operation
    pub stop_anchor: Option<u16>,
    /// Absent content (with a start anchor present) means delete
    pub content: Option<String>,
    /// Insert the content before the resolved start line instead of
    /// replacing it
    pub insert_before: bool,
}

/// Error types for the edit pipeline
///
/// Every resolution failure is detected strictly before the mutation is
/// dispatched. No automatic retries: each failure is reported with enough
/// detail for the caller to re-read and resubmit.
#[derive(Debug)]
pub enum EditError {
    Snapshot(SnapshotError),
    Resolve(ResolveError),
    /// Neither a start anchor nor content was supplied
    MissingContent,
    /// `insert_before` combined with a stop anchor; insertion takes a
    /// single position, never a range
    RangedInsert,
    /// The executor reported a nonzero/error outcome
    ExternalFailure(String),
    /// Cancellation fired before the mutation was dispatched
    Cancelled,
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::Snapshot(e) => write!(f, "{}", e),
            EditError::Resolve(e) => write!(f, "{}", e),
            EditError::MissingContent => {
                write!(f, "Nothing to do: no start anchor and no content supplied")
            }
            EditError::RangedInsert => {
                write!(
                    f,
                    "Insert targets a single position; remove the stop anchor"
                )
            }
            EditError::ExternalFailure(e) => write!(f, "Mutation executor failed: {}", e),
            EditError::Cancelled => write!(f, "Cancelled before the mutation was dispatched"),
        }
    }
}

impl std::error::Error for EditError {}

impl From<SnapshotError> for EditError {
    fn from(err: SnapshotError) -> Self {
        EditError::Snapshot(err)
    }
}

impl From<ResolveError> for EditError {
    fn from(err: ResolveError) -> Self {
        EditError::Resolve(err)
    }
}

/// Result of a completed edit
#[derive(Debug, Clone)]
pub struct EditOutcome {
    /// Operation performed: "create", "insert", "replace" or "delete"
    pub operation: &'static str,
    pub path: String,
    /// Windowed, line-numbered change report
    pub report: DiffReport,
    /// Wire-form anchors of the newly written boundary lines, so the
    /// caller can continue editing without a full re-read
    pub new_anchors: Vec<String>,
    /// BLAKE3 checksum of the file as written; None for a no-op
    pub checksum: Option<String>,
    /// True when start resolution picked first-of-many without a
    /// disambiguator; surfaced to the caller as a warning
    pub ambiguous: bool,
}

/// Resolve, validate and apply one edit against a fresh snapshot
///
/// The request moves through: resolving (anchors to line numbers; may
/// reject), dispatching the executor (may fail; cancellation is honored
/// only up to this point), then reporting (diff windowed, continuation
/// anchors hashed over the newly written region only).
pub fn apply_edit(
    spec: &EditSpec,
    executor: &dyn MutationExecutor,
    cancel: &CancelToken,
    timeout: Duration,
) -> Result<EditOutcome, EditError> {
    let (operation, kind, ambiguous) = plan(spec)?;
    debug!("edit {} -> {:?}", spec.path, kind);

    if cancel.is_cancelled() {
        return Err(EditError::Cancelled);
    }

    let outcome = executor
        .apply(
            &spec.path,
            kind,
            spec.content.as_deref().map(str::as_bytes),
            timeout,
        )
        .map_err(|e| EditError::ExternalFailure(e.to_string()))?;

    let (report, checksum) = match outcome {
        MutationOutcome::Unchanged => (DiffReport::from_unified(""), None),
        MutationOutcome::Changed { diff, checksum } => {
            (DiffReport::from_unified(&diff), Some(checksum))
        }
    };

    let new_anchors = if report.is_empty() {
        Vec::new()
    } else {
        boundary_anchors(spec.content.as_deref())
    };

    Ok(EditOutcome {
        operation,
        path: spec.path.clone(),
        report,
        new_anchors,
        checksum,
        ambiguous,
    })
}

/// Turn a spec into a concrete line-range operation against a fresh
/// snapshot; all classified resolution failures happen here
fn plan(spec: &EditSpec) -> Result<(&'static str, MutationKind, bool), EditError> {
    let Some(start_anchor) = spec.start_anchor else {
        // No start anchor: create/overwrite with the content verbatim.
        if spec.content.is_none() {
            return Err(EditError::MissingContent);
        }
        return Ok(("create", MutationKind::Create, false));
    };

    if spec.insert_before && spec.stop_anchor.is_some() {
        return Err(EditError::RangedInsert);
    }

    // Fresh snapshot per request; never reused across edit calls.
    let snapshot = read_snapshot(&spec.path)?;

    let (start, stop) = match spec.stop_anchor {
        Some(stop_anchor) => {
            resolve_range(&snapshot, start_anchor, spec.disambiguator, stop_anchor)?
        }
        None => {
            let start = resolve(&snapshot, start_anchor, spec.disambiguator)?;
            (start, start.line)
        }
    };

    let (operation, kind) = match (&spec.content, spec.insert_before) {
        (None, _) => (
            "delete",
            MutationKind::DeleteRange {
                start: start.line,
                stop,
            },
        ),
        (Some(_), true) => ("insert", MutationKind::InsertBefore { line: start.line }),
        (Some(_), false) => (
            "replace",
            MutationKind::ReplaceRange {
                start: start.line,
                stop,
            },
        ),
    };

    Ok((operation, kind, start.ambiguous))
}

/// Anchors of the first and last non-empty lines of the written content
///
/// The written region is exactly the supplied content, so the hasher runs
/// over it directly instead of rescanning the whole file.
fn boundary_anchors(content: Option<&str>) -> Vec<String> {
    let Some(content) = content else {
        return Vec::new();
    };
    let lines: Vec<&str> = content
        .strip_suffix('\n')
        .unwrap_or(content)
        .split('\n')
        .filter(|line| !line.is_empty())
        .collect();

    let mut anchors = Vec::new();
    if let Some(first) = lines.first() {
        anchors.push(format_anchor(line_hash(first)));
    }
    if lines.len() > 1 {
        if let Some(last) = lines.last() {
            let anchor = format_anchor(line_hash(last));
            if anchors.first() != Some(&anchor) {
                anchors.push(anchor);
            }
        }
    }
    anchors
}

/// Built-in executor: splices the line range in-process and produces its
/// before/after comparison with a patience diff
///
/// The rewrite goes through a uniquely-named sibling temp file followed by
/// a rename, so readers never observe a half-written file.
#[derive(Debug, Default)]
pub struct FsExecutor;

impl FsExecutor {
    fn write_atomic(&self, path: &str, content: &str) -> Result<(), ExecutorError> {
        let tmp = format!("{}.{}.tmp", path, uuid::Uuid::new_v4());
        fs::write(&tmp, content).map_err(|e| ExecutorError::Io(e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            ExecutorError::Io(e.to_string())
        })
    }
}

impl MutationExecutor for FsExecutor {
    fn apply(
        &self,
        path: &str,
        kind: MutationKind,
        content: Option<&[u8]>,
        _timeout: Duration,
    ) -> Result<MutationOutcome, ExecutorError> {
        let old_content = if Path::new(path).exists() {
            let bytes = fs::read(path).map_err(|e| ExecutorError::Io(e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| ExecutorError::Io(e.to_string()))?
        } else if kind == MutationKind::Create {
            String::new()
        } else {
            return Err(ExecutorError::Io(format!("file not found: {}", path)));
        };

        let text = content
            .map(|bytes| {
                String::from_utf8(bytes.to_vec()).map_err(|e| ExecutorError::Io(e.to_string()))
            })
            .transpose()?;

        let new_content = splice(&old_content, kind, text.as_deref())?;

        if new_content == old_content {
            return Ok(MutationOutcome::Unchanged);
        }

        self.write_atomic(path, &new_content)?;

        let diff = TextDiff::configure()
            .algorithm(Algorithm::Patience)
            .diff_lines(&old_content, &new_content)
            .unified_diff()
            .context_radius(crate::diff::CONTEXT_RADIUS)
            .header(path, path)
            .to_string();
        let checksum = blake3::hash(new_content.as_bytes()).to_hex().to_string();

        Ok(MutationOutcome::Changed { diff, checksum })
    }
}

/// Apply a line-range operation to content in memory
fn splice(
    old_content: &str,
    kind: MutationKind,
    text: Option<&str>,
) -> Result<String, ExecutorError> {
    let old = Snapshot::from_content("", old_content);
    let len = old.len();

    let new_lines: Vec<String> = text
        .map(|t| {
            t.strip_suffix('\n')
                .unwrap_or(t)
                .split('\n')
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut lines = old.lines.clone();
    match kind {
        // Create takes the content verbatim, no splicing.
        MutationKind::Create => return Ok(text.unwrap_or_default().to_string()),
        MutationKind::InsertBefore { line } => {
            if line == 0 || line > len + 1 {
                return Err(ExecutorError::OutOfBounds {
                    start: line,
                    stop: line,
                    len,
                });
            }
            lines.splice(line - 1..line - 1, new_lines);
        }
        MutationKind::ReplaceRange { start, stop } => {
            check_range(start, stop, len)?;
            lines.splice(start - 1..stop, new_lines);
        }
        MutationKind::DeleteRange { start, stop } => {
            check_range(start, stop, len)?;
            lines.splice(start - 1..stop, Vec::new());
        }
    }

    let mut out = lines.join("\n");
    if (old.trailing_newline || old.is_empty()) && !lines.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

fn check_range(start: usize, stop: usize, len: usize) -> Result<(), ExecutorError> {
    if start == 0 || stop < start || stop > len {
        return Err(ExecutorError::OutOfBounds { start, stop, len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffKind, ReportRow};
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn spec_for(path: &str) -> EditSpec {
        EditSpec {
            path: path.to_string(),
            ..EditSpec::default()
        }
    }

    fn run(spec: &EditSpec) -> Result<EditOutcome, EditError> {
        apply_edit(
            spec,
            &FsExecutor,
            &CancelToken::new(),
            DEFAULT_MUTATION_TIMEOUT,
        )
    }

    #[test]
    fn test_replace_middle_line() {
        let file = write_temp("func f() {\n  return 1\n}\n");
        let path = file.path().display().to_string();

        let mut spec = spec_for(&path);
        spec.start_anchor = Some(line_hash("  return 1"));
        spec.content = Some("  return 2".to_string());

        let outcome = run(&spec).unwrap();

        assert_eq!(outcome.operation, "replace");
        assert!(!outcome.ambiguous);
        assert_eq!(outcome.report.first_changed_line, Some(2));
        assert_eq!(
            outcome.new_anchors,
            vec![format_anchor(line_hash("  return 2"))]
        );

        let removed = outcome.report.rows.iter().any(|row| {
            matches!(row, ReportRow::Entry(e) if e.kind == DiffKind::Removed && e.text == "  return 1")
        });
        let added = outcome.report.rows.iter().any(|row| {
            matches!(row, ReportRow::Entry(e) if e.kind == DiffKind::Added && e.text == "  return 2")
        });
        assert!(removed && added);

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "func f() {\n  return 2\n}\n");
        assert_eq!(
            outcome.checksum.as_deref(),
            Some(blake3::hash(written.as_bytes()).to_hex().as_str())
        );
    }

    #[test]
    fn test_one_line_edit_in_large_file_stays_bounded() {
        let content: String = (1..=1000).map(|i| format!("row number {}\n", i)).collect();
        let file = write_temp(&content);
        let path = file.path().display().to_string();

        let mut spec = spec_for(&path);
        spec.start_anchor = Some(line_hash("row number 500"));
        spec.content = Some("row number five hundred".to_string());

        let outcome = run(&spec).unwrap();

        assert_eq!(outcome.report.first_changed_line, Some(500));
        // Change rows plus at most CONTEXT_RADIUS context on each side,
        // never anything near the full file.
        assert!(
            outcome.report.rows.len() <= 2 + 2 * crate::diff::CONTEXT_RADIUS + 2,
            "report too large: {} rows",
            outcome.report.rows.len()
        );
    }

    #[test]
    fn test_delete_range() {
        let file = write_temp("keep\nfrom\nmiddle\nto\nkeep2\n");
        let path = file.path().display().to_string();

        let mut spec = spec_for(&path);
        spec.start_anchor = Some(line_hash("from"));
        spec.stop_anchor = Some(line_hash("to"));

        let outcome = run(&spec).unwrap();

        assert_eq!(outcome.operation, "delete");
        assert!(outcome.new_anchors.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep\nkeep2\n");
    }

    #[test]
    fn test_insert_before() {
        let file = write_temp("first\nlast\n");
        let path = file.path().display().to_string();

        let mut spec = spec_for(&path);
        spec.start_anchor = Some(line_hash("last"));
        spec.content = Some("middle\n".to_string());
        spec.insert_before = true;

        let outcome = run(&spec).unwrap();

        assert_eq!(outcome.operation, "insert");
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nmiddle\nlast\n");
        assert_eq!(outcome.new_anchors, vec![format_anchor(line_hash("middle"))]);
    }

    #[test]
    fn test_create_overwrites_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.txt").display().to_string();

        let mut spec = spec_for(&path);
        spec.content = Some("one\ntwo\n".to_string());

        let outcome = run(&spec).unwrap();

        assert_eq!(outcome.operation, "create");
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
        assert_eq!(outcome.report.first_changed_line, Some(1));
        assert_eq!(
            outcome.new_anchors,
            vec![
                format_anchor(line_hash("one")),
                format_anchor(line_hash("two")),
            ]
        );
    }

    #[test]
    fn test_noop_replace_reports_no_changes() {
        let file = write_temp("a\nb\nc\n");
        let path = file.path().display().to_string();

        let mut spec = spec_for(&path);
        spec.start_anchor = Some(line_hash("b"));
        spec.content = Some("b".to_string());

        let outcome = run(&spec).unwrap();

        assert!(outcome.report.is_empty());
        assert!(outcome.new_anchors.is_empty());
        assert_eq!(outcome.report.render(), "No changes");
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\nc\n");
    }

    #[test]
    fn test_stale_anchor_never_touches_file() {
        let file = write_temp("a\nb\n");
        let path = file.path().display().to_string();

        let mut spec = spec_for(&path);
        spec.start_anchor = Some(line_hash("vanished line"));
        spec.content = Some("x".to_string());

        let result = run(&spec);
        assert!(matches!(
            result,
            Err(EditError::Resolve(ResolveError::StaleAnchor { .. }))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[test]
    fn test_cancel_before_dispatch_leaves_file_untouched() {
        let file = write_temp("a\nb\n");
        let path = file.path().display().to_string();

        let mut spec = spec_for(&path);
        spec.start_anchor = Some(line_hash("a"));
        spec.content = Some("changed".to_string());

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = apply_edit(&spec, &FsExecutor, &cancel, DEFAULT_MUTATION_TIMEOUT);

        assert!(matches!(result, Err(EditError::Cancelled)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[test]
    fn test_missing_content_and_anchor_rejected() {
        let spec = spec_for("/tmp/whatever");
        assert!(matches!(run(&spec), Err(EditError::MissingContent)));
    }

    #[test]
    fn test_insert_with_stop_anchor_rejected() {
        let file = write_temp("first\nlast\n");
        let path = file.path().display().to_string();

        let mut spec = spec_for(&path);
        spec.start_anchor = Some(line_hash("first"));
        spec.stop_anchor = Some(line_hash("last"));
        spec.content = Some("middle".to_string());
        spec.insert_before = true;

        assert!(matches!(run(&spec), Err(EditError::RangedInsert)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nlast\n");
    }

    #[test]
    fn test_ambiguous_duplicate_flagged_not_failed() {
        let file = write_temp("x\ny\nx\n");
        let path = file.path().display().to_string();

        let mut spec = spec_for(&path);
        spec.start_anchor = Some(line_hash("x"));
        spec.content = Some("first x".to_string());

        let outcome = run(&spec).unwrap();

        assert!(outcome.ambiguous);
        assert_eq!(fs::read_to_string(&path).unwrap(), "first x\ny\nx\n");
    }

    #[test]
    fn test_offset_targets_later_duplicate() {
        let file = write_temp("x\ny\nx\n");
        let path = file.path().display().to_string();

        let mut spec = spec_for(&path);
        spec.start_anchor = Some(line_hash("x"));
        spec.disambiguator = Some(Disambiguator::Offset(3));
        spec.content = Some("second x".to_string());

        let outcome = run(&spec).unwrap();

        assert!(!outcome.ambiguous);
        assert_eq!(fs::read_to_string(&path).unwrap(), "x\ny\nsecond x\n");
    }

    #[test]
    fn test_splice_preserves_missing_trailing_newline() {
        let new = splice(
            "a\nb\nc",
            MutationKind::ReplaceRange { start: 2, stop: 2 },
            Some("B"),
        )
        .unwrap();
        assert_eq!(new, "a\nB\nc");
    }

    #[test]
    fn test_splice_delete_everything() {
        let new = splice(
            "a\nb\n",
            MutationKind::DeleteRange { start: 1, stop: 2 },
            None,
        )
        .unwrap();
        assert_eq!(new, "");
    }

    #[test]
    fn test_splice_out_of_bounds() {
        let result = splice(
            "a\nb\n",
            MutationKind::ReplaceRange { start: 2, stop: 5 },
            Some("x"),
        );
        assert!(matches!(result, Err(ExecutorError::OutOfBounds { .. })));
    }
}
