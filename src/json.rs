use crate::edit::{EditOutcome, EditSpec};
use crate::hash::parse_anchor;
use crate::resolve::Disambiguator;
use crate::tag::TagPolicy;
use serde::{Deserialize, Serialize};

/// Generate a unique execution ID for an edit request
pub fn generate_execution_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_execution_id() -> String {
    "auto".to_string()
}

/// JSON read request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Target path
    pub path: String,
    /// 1-indexed first line of the window (default: 1)
    #[serde(default)]
    pub start_line: Option<usize>,
    /// Maximum number of lines to read (default: the line ceiling)
    #[serde(default)]
    pub max_lines: Option<usize>,
    /// Prefix each line with its anchor
    #[serde(default)]
    pub anchors: bool,
    /// Duplicate-visibility policy for the anchor column
    #[serde(default)]
    pub policy: TagPolicy,
}

/// JSON read response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResponse {
    pub success: bool,
    pub path: String,
    /// The bounded text block, anchor-tagged when requested
    pub text: String,
    pub lines_shown: usize,
    pub bytes_shown: usize,
    pub truncated: bool,
    /// 1-indexed line to resume from, present only when truncated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReadResponse {
    pub fn failure(path: String, error: String) -> Self {
        ReadResponse {
            success: false,
            path,
            text: String::new(),
            lines_shown: 0,
            bytes_shown: 0,
            truncated: false,
            next_offset: None,
            error: Some(error),
        }
    }
}

/// JSON edit request
///
/// Anchors travel in their 2-character wire form. Omitting `start_anchor`
/// means create/overwrite with `content` verbatim; omitting `content`
/// while supplying `start_anchor` means delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    pub path: String,
    /// "auto" (the default) asks the tool to generate one
    #[serde(default = "default_execution_id")]
    pub execution_id: String,
    #[serde(default)]
    pub start_anchor: Option<String>,
    /// Offset disambiguator: line number to begin searching from
    #[serde(default)]
    pub offset: Option<usize>,
    /// Context disambiguator: a nearby anchor believed unique
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub stop_anchor: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Insert before the resolved start line instead of replacing it
    #[serde(default)]
    pub insert_before: bool,
}

impl EditRequest {
    /// Parse the wire-form anchors into an edit spec
    ///
    /// When both disambiguators are supplied, context (the stronger claim)
    /// wins and the offset is ignored.
    pub fn to_spec(&self) -> Result<EditSpec, String> {
        let start_anchor = parse_field(self.start_anchor.as_deref(), "start_anchor")?;
        let stop_anchor = parse_field(self.stop_anchor.as_deref(), "stop_anchor")?;
        let context = parse_field(self.context.as_deref(), "context")?;

        let disambiguator = match (context, self.offset) {
            (Some(anchor), _) => Some(Disambiguator::Context(anchor)),
            (None, Some(line)) => Some(Disambiguator::Offset(line)),
            (None, None) => None,
        };

        Ok(EditSpec {
            path: self.path.clone(),
            start_anchor,
            disambiguator,
            stop_anchor,
            content: self.content.clone(),
            insert_before: self.insert_before,
        })
    }

}

fn parse_field(value: Option<&str>, field: &str) -> Result<Option<u16>, String> {
    match value {
        None => Ok(None),
        Some(text) => parse_anchor(text)
            .map(Some)
            .ok_or_else(|| format!("Invalid anchor '{}' in field '{}'", text, field)),
    }
}

/// JSON edit response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditResponse {
    pub success: bool,
    pub execution_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub path: String,
    /// Rendered windowed diff report ("No changes" for a no-op)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_changed_line: Option<usize>,
    #[serde(default)]
    pub lines_added: usize,
    #[serde(default)]
    pub lines_removed: usize,
    /// Anchors of the newly written boundary lines
    #[serde(default)]
    pub new_anchors: Vec<String>,
    /// BLAKE3 checksum of the file as written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// The start anchor matched several lines and the first was used
    #[serde(default)]
    pub ambiguous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EditResponse {
    pub fn success(execution_id: String, outcome: &EditOutcome) -> Self {
        EditResponse {
            success: true,
            execution_id,
            operation: Some(outcome.operation.to_string()),
            path: outcome.path.clone(),
            diff: Some(outcome.report.render()),
            first_changed_line: outcome.report.first_changed_line,
            lines_added: outcome.report.lines_added,
            lines_removed: outcome.report.lines_removed,
            new_anchors: outcome.new_anchors.clone(),
            checksum: outcome.checksum.clone(),
            ambiguous: outcome.ambiguous,
            error: None,
        }
    }

    pub fn failure(execution_id: String, path: String, error: String) -> Self {
        EditResponse {
            success: false,
            execution_id,
            operation: None,
            path,
            diff: None,
            first_changed_line: None,
            lines_added: 0,
            lines_removed: 0,
            new_anchors: Vec::new(),
            checksum: None,
            ambiguous: false,
            error: Some(error),
        }
    }
}
