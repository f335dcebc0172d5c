use clap::{Parser, Subcommand};
use line_anchor::{
    apply_edit,
    json::{generate_execution_id, EditRequest, EditResponse, ReadRequest, ReadResponse},
    read_snapshot, tag_window, truncate_block, CancelToken, FsExecutor, TagPolicy, TaggedLine,
    TruncateLimits, DEFAULT_MUTATION_TIMEOUT,
};
use std::fs;
use std::io::{self, Read};

/// Anchor-addressed line edits for LLM workflows
#[derive(Parser, Debug)]
#[command(name = "line-anchor")]
#[command(version = "0.1.0")]
#[command(about = "Content-hash line anchors for drift-free text edits", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a file, optionally tagging each line with its anchor
    Read {
        /// File to read
        #[arg(short, long)]
        file: String,

        /// 1-indexed line to start from
        #[arg(long)]
        start: Option<usize>,

        /// Maximum number of lines to return
        #[arg(long)]
        limit: Option<usize>,

        /// Prefix each line with its anchor
        #[arg(short, long)]
        anchors: bool,

        /// Show an anchor only on the first occurrence of duplicated content
        #[arg(long)]
        dedup: bool,

        /// Output structured JSON instead of human-readable
        #[arg(short, long)]
        json: bool,
    },
    /// Apply an anchor-addressed edit described by a JSON request
    Edit {
        /// JSON file containing the edit request (omit to read from stdin)
        #[arg(short, long)]
        request: Option<String>,

        /// Output structured JSON instead of human-readable
        #[arg(short, long)]
        json: bool,

        /// Write output to file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    match args.command {
        Command::Read {
            file,
            start,
            limit,
            anchors,
            dedup,
            json,
        } => {
            let request = ReadRequest {
                path: file,
                start_line: start,
                max_lines: limit,
                anchors,
                policy: if dedup {
                    TagPolicy::FirstOccurrence
                } else {
                    TagPolicy::MarkAll
                },
            };
            run_read(&request, json);
        }
        Command::Edit {
            request,
            json,
            output,
        } => run_edit(request.as_ref(), json, output.as_ref()),
    }
}

fn run_read(request: &ReadRequest, json: bool) {
    let limits = TruncateLimits::default();
    // Clamp before tagging so the resume offset counts from the line the
    // window actually starts at.
    let start = request.start_line.unwrap_or(1).max(1);

    let snapshot = match read_snapshot(&request.path) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            emit_read(ReadResponse::failure(request.path.clone(), e.to_string()), json);
            std::process::exit(1);
        }
    };

    let count = request.max_lines.unwrap_or(limits.max_lines);
    let tagged = tag_window(&snapshot, start, count, request.policy);
    let rendered: Vec<String> = if request.anchors {
        tagged.iter().map(TaggedLine::render).collect()
    } else {
        tagged.iter().map(|line| line.text.clone()).collect()
    };

    match truncate_block(&rendered, start, &limits) {
        Ok(truncation) => {
            let response = ReadResponse {
                success: true,
                path: request.path.clone(),
                text: truncation.text,
                lines_shown: truncation.lines_shown,
                bytes_shown: truncation.bytes_shown,
                truncated: truncation.truncated,
                next_offset: truncation.next_offset,
                error: None,
            };
            emit_read(response, json);
        }
        Err(e) => {
            emit_read(ReadResponse::failure(request.path.clone(), e.to_string()), json);
            std::process::exit(1);
        }
    }
}

fn emit_read(response: ReadResponse, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response)
                .unwrap_or_else(|_| r#"{"error": "Failed to serialize response"}"#.to_string())
        );
        return;
    }
    if response.success {
        println!("{}", response.text);
        if response.truncated {
            if let Some(offset) = response.next_offset {
                eprintln!(
                    "[truncated after {} lines / {} bytes; resume at line {}]",
                    response.lines_shown, response.bytes_shown, offset
                );
            }
        }
    } else {
        eprintln!(
            "Error: {}",
            response.error.as_deref().unwrap_or("Unknown error")
        );
    }
}

/// Read an EditRequest from file path or stdin
fn read_edit_request(path: Option<&String>) -> Result<EditRequest, Box<dyn std::error::Error>> {
    let json_str = if let Some(p) = path {
        fs::read_to_string(p)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let request: EditRequest = serde_json::from_str(&json_str)?;
    Ok(request)
}

fn run_edit(request_path: Option<&String>, json: bool, output_path: Option<&String>) {
    let request = match read_edit_request(request_path) {
        Ok(req) => req,
        Err(e) => {
            eprintln!("Error reading edit request: {}", e);
            std::process::exit(1);
        }
    };

    let execution_id = if request.execution_id == "auto" {
        generate_execution_id()
    } else {
        request.execution_id.clone()
    };

    let spec = match request.to_spec() {
        Ok(spec) => spec,
        Err(e) => {
            let response = EditResponse::failure(execution_id, request.path.clone(), e);
            output_response(&response, json, output_path);
            std::process::exit(1);
        }
    };

    let result = apply_edit(
        &spec,
        &FsExecutor,
        &CancelToken::new(),
        DEFAULT_MUTATION_TIMEOUT,
    );

    let response = match result {
        Ok(outcome) => EditResponse::success(execution_id, &outcome),
        Err(e) => EditResponse::failure(execution_id, request.path.clone(), e.to_string()),
    };

    output_response(&response, json, output_path);

    if !response.success {
        std::process::exit(1);
    }
}

/// Format and output the edit response
fn output_response(response: &EditResponse, json_mode: bool, output_path: Option<&String>) {
    let output = if json_mode {
        serde_json::to_string_pretty(response)
            .unwrap_or_else(|_| r#"{"error": "Failed to serialize response"}"#.to_string())
    } else if response.success {
        let mut text = format!(
            "{}: {}",
            response.operation.as_deref().unwrap_or("edit"),
            response.path
        );
        if response.ambiguous {
            text.push_str("\nWarning: start anchor matched multiple lines; edited the first match");
        }
        if let Some(diff) = &response.diff {
            text.push('\n');
            text.push_str(diff.trim_end());
        }
        if !response.new_anchors.is_empty() {
            text.push_str(&format!("\nNew anchors: {}", response.new_anchors.join(", ")));
        }
        if let Some(checksum) = &response.checksum {
            text.push_str(&format!("\nChecksum: {}", checksum));
        }
        text
    } else {
        format!(
            "Error: {}",
            response.error.as_deref().unwrap_or("Unknown error")
        )
    };

    if let Some(path) = output_path {
        if let Err(e) = fs::write(path, &output) {
            eprintln!("Failed to write output to '{}': {}", path, e);
            std::process::exit(1);
        }
    } else {
        println!("{}", output);
    }
}
