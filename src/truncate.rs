use log::debug;

/// Independent ceilings on the material returned by one read
///
/// Pure configuration: the numbers bound output size and never affect
/// tagging or resolution.
#[derive(Debug, Clone, Copy)]
pub struct TruncateLimits {
    /// Maximum number of lines returned
    pub max_lines: usize,
    /// Maximum number of bytes returned (including line separators)
    pub max_bytes: usize,
}

impl Default for TruncateLimits {
    fn default() -> Self {
        TruncateLimits {
            max_lines: 2000,
            max_bytes: 50 * 1024,
        }
    }
}

/// Result of bounding a read block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncation {
    /// The bounded block, lines joined with `\n`
    pub text: String,
    pub lines_shown: usize,
    pub bytes_shown: usize,
    /// True when the ceilings cut the block short
    pub truncated: bool,
    /// 1-indexed line to resume reading from, present only when truncated
    pub next_offset: Option<usize>,
}

/// Error types for the read path's size accounting
#[derive(Debug, PartialEq, Eq)]
pub enum TruncateError {
    /// A single line alone exceeds the byte ceiling; no partial fragment
    /// of it is ever emitted
    Oversize {
        line: usize,
        bytes: usize,
        limit: usize,
    },
}

impl std::fmt::Display for TruncateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TruncateError::Oversize { line, bytes, limit } => {
                write!(
                    f,
                    "Line {} is {} bytes, over the {}-byte read ceiling; \
                     use a narrower extraction mechanism for this line",
                    line, bytes, limit
                )
            }
        }
    }
}

impl std::error::Error for TruncateError {}

/// Bound a rendered block to the given line and byte ceilings
///
/// `first_line` is the 1-indexed snapshot line number of `rendered[0]`,
/// used both for the Oversize report and the resume offset. This is pure
/// byte/line accounting: lines are taken whole, in order, until either
/// ceiling would be crossed.
pub fn truncate_block(
    rendered: &[String],
    first_line: usize,
    limits: &TruncateLimits,
) -> Result<Truncation, TruncateError> {
    let mut lines_shown = 0usize;
    let mut bytes_shown = 0usize;

    for (idx, line) in rendered.iter().enumerate() {
        if lines_shown == limits.max_lines {
            break;
        }
        // +1 separator for every line after the first
        let cost = line.len() + usize::from(lines_shown > 0);
        if bytes_shown + cost > limits.max_bytes {
            if lines_shown == 0 {
                return Err(TruncateError::Oversize {
                    line: first_line + idx,
                    bytes: line.len(),
                    limit: limits.max_bytes,
                });
            }
            break;
        }
        lines_shown += 1;
        bytes_shown += cost;
    }

    let truncated = lines_shown < rendered.len();
    if truncated {
        debug!(
            "read truncated at {} of {} lines ({} bytes)",
            lines_shown,
            rendered.len(),
            bytes_shown
        );
    }

    Ok(Truncation {
        text: rendered[..lines_shown].join("\n"),
        lines_shown,
        bytes_shown,
        truncated,
        next_offset: truncated.then(|| first_line + lines_shown),
    })
}
