// Line hashing module
pub mod hash;

// Snapshot reading module
pub mod snapshot;

// Anchor tagging module
pub mod tag;

// Anchor resolution module
pub mod resolve;

// Diff report module
pub mod diff;

// Read truncation module
pub mod truncate;

// Edit pipeline module
pub mod edit;

// JSON surface module
pub mod json;

// Re-exports
pub use hash::{format_anchor, line_hash, parse_anchor, ANCHOR_SPACE, BLANK_MARKER};
pub use snapshot::{read_snapshot, Snapshot, SnapshotError};
pub use tag::{render_tagged, tag_snapshot, tag_window, TagPolicy, TaggedLine};
pub use resolve::{
    resolve, resolve_range, resolve_unique, Disambiguator, Resolution, ResolveError,
};
pub use diff::{DiffEntry, DiffKind, DiffReport, ReportRow, CONTEXT_RADIUS};
pub use truncate::{truncate_block, TruncateError, TruncateLimits, Truncation};
pub use edit::{
    apply_edit, CancelToken, EditError, EditOutcome, EditSpec, ExecutorError, FsExecutor,
    MutationExecutor, MutationKind, MutationOutcome, DEFAULT_MUTATION_TIMEOUT,
};
pub use json::{generate_execution_id, EditRequest, EditResponse, ReadRequest, ReadResponse};
