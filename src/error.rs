use std::path::PathBuf;

use thiserror::Error;

/// Structural problems with a parsed extraction response.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<&'static str>),
    #[error("detailed_stats_category is empty")]
    EmptyCategory,
    #[error("malformed record: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("failed listing {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template {path} has {found} sheets, need at least {needed}")]
    MalformedTemplate {
        path: PathBuf,
        found: usize,
        needed: usize,
    },
    #[error("failed reading template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: calamine::XlsxError,
    },
    #[error("no readable workbook among {0} candidates")]
    NoReadableInput(usize),
    #[error("failed writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}

/// Failures of the image understanding call.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("image not found: {0}")]
    ImageNotFound(PathBuf),
    #[error("failed reading image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("response had no text{}", feedback_suffix(.feedback))]
    EmptyResponse { feedback: Option<String> },
}

fn feedback_suffix(feedback: &Option<String>) -> String {
    feedback
        .as_ref()
        .map(|f| format!(" (prompt feedback: {f})"))
        .unwrap_or_default()
}

/// Errors that stop a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("input image not found: {0}")]
    InputNotFound(PathBuf),
    #[error("extraction failed for {image}: {source}")]
    Extraction {
        image: PathBuf,
        #[source]
        source: ExtractError,
    },
    #[error("could not parse response for {image} as JSON: {source}\nraw response:\n{raw}")]
    ResponseParse {
        image: PathBuf,
        raw: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid record for {image}: {source}")]
    Validation {
        image: PathBuf,
        #[source]
        source: ValidationError,
    },
    #[error("export failed for {image}: {source}")]
    Export {
        image: PathBuf,
        #[source]
        source: ExportError,
    },
    #[error("filesystem error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
