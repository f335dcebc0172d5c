use std::fs;
use std::io;
use std::path::Path;

/// An ordered view of a file's lines, read atomically at one instant
///
/// All anchor resolution operates against exactly one snapshot. A snapshot
/// is never reused across two edit calls: every edit re-reads the file
/// before resolving, so staleness is bounded by one call's duration.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Absolute path the snapshot was read from
    pub path: String,
    /// File content split into lines (1-indexed externally, 0-indexed here)
    pub lines: Vec<String>,
    /// BLAKE3 hash of the raw content (hex-encoded)
    pub checksum: String,
    /// Whether the file ended with a trailing newline
    pub trailing_newline: bool,
}

impl Snapshot {
    /// Number of lines in the snapshot
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True for an empty file
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Fetch a line by its 1-indexed number
    pub fn line(&self, number: usize) -> Option<&str> {
        if number == 0 {
            return None;
        }
        self.lines.get(number - 1).map(String::as_str)
    }

    /// Rejoin the lines into the original content
    pub fn content(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Build a snapshot from in-memory content (used by tests and by the
    /// executor when diffing before/after states)
    pub fn from_content(path: &str, content: &str) -> Self {
        let checksum = blake3::hash(content.as_bytes()).to_hex().to_string();
        let trailing_newline = content.ends_with('\n');
        let lines: Vec<String> = if content.is_empty() {
            Vec::new()
        } else {
            content
                .strip_suffix('\n')
                .unwrap_or(content)
                .split('\n')
                .map(str::to_string)
                .collect()
        };
        Snapshot {
            path: path.to_string(),
            lines,
            checksum,
            trailing_newline,
        }
    }
}

/// Error types for snapshot reads
#[derive(Debug)]
pub enum SnapshotError {
    NotFound(String),
    IoError(String),
    InvalidUtf8(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::NotFound(p) => write!(f, "File not found: {}", p),
            SnapshotError::IoError(e) => write!(f, "I/O error: {}", e),
            SnapshotError::InvalidUtf8(p) => write!(f, "Invalid UTF-8 in file: {}", p),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<io::Error> for SnapshotError {
    fn from(err: io::Error) -> Self {
        SnapshotError::IoError(err.to_string())
    }
}

/// Read a fresh snapshot of a file from disk
///
/// # Arguments
/// * `path` - Path to the file to read
///
/// # Returns
/// * `Ok(Snapshot)` - Ordered line view with checksum
/// * `Err(SnapshotError)` - File not found, I/O error, or invalid UTF-8
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Snapshot, SnapshotError> {
    let path_ref = path.as_ref();

    if !path_ref.exists() {
        return Err(SnapshotError::NotFound(path_ref.display().to_string()));
    }

    let bytes = fs::read(path_ref)?;

    let content = String::from_utf8(bytes)
        .map_err(|_| SnapshotError::InvalidUtf8(path_ref.display().to_string()))?;

    Ok(Snapshot::from_content(
        &path_ref.display().to_string(),
        &content,
    ))
}
