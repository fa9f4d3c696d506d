//! Error types for the benchmark pipeline
//!
//! Every failure is fatal. Variants are grouped the way the pipeline fails:
//! configuration problems are reported before any side effects, collaborator
//! failures abort the run, and serialization failures refuse to write a
//! partial project graph.

use std::path::PathBuf;
use thiserror::Error;

pub type BenchResult<T> = Result<T, BenchError>;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum BenchError {
    // Configuration
    #[error("Case description sets both Repo and LocalCodeRoot; exactly one is required")]
    ConflictingCodebaseSource,

    #[error("Case description sets neither Repo nor LocalCodeRoot; exactly one is required")]
    MissingCodebaseSource,

    #[error("At least one engine version is required")]
    NoVersions,

    #[error("Invalid version spec '{spec}': {reason}")]
    InvalidVersionSpec { spec: String, reason: String },

    #[error("Invalid config {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("Invalid checkout name '{name}': {reason}")]
    InvalidCheckoutName { name: String, reason: &'static str },

    #[error("Failed to parse case description {path}")]
    CaseParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // Collaborators
    #[error("Failed to start '{program}'")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {}", exit_label(.code))]
    CommandFailed { program: String, code: Option<i32> },

    #[error("Refusing to remove {path}: not inside checkout directory {checkout_dir}")]
    CleanupOutsideCheckout { path: PathBuf, checkout_dir: PathBuf },

    #[error("Solution {path} contains no projects")]
    EmptySolution { path: PathBuf },

    #[error("Project name '{name}' is ambiguous: {first} and {second}")]
    DuplicateProjectName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Unknown project '{name}' (solution has: {})", .known.join(", "))]
    UnknownProject { name: String, known: Vec<String> },

    #[error("Failed to read source file: {path}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File too large: {path} ({size} bytes, limit {limit} bytes)")]
    FileTooBig { path: PathBuf, size: u64, limit: u64 },

    #[error("Not a regular file: {path}")]
    FileNotRegular { path: PathBuf },

    #[error("Build finished but no package matching '{pattern}' in {dir}")]
    PackageMissing { dir: PathBuf, pattern: String },

    #[error("Project cracker produced invalid output: {message}")]
    CrackerOutput { message: String },

    // Serialization
    #[error("Project {project} has an unsupported {kind} reference; only source project references can be serialized")]
    UnsupportedReference { project: PathBuf, kind: &'static str },

    #[error("Project node refers to stamp {stamp} before it was defined")]
    DanglingReference { stamp: i64 },

    #[error("Malformed bundle {path}")]
    BundleParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BenchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BenchError::Io {
            path: path.into(),
            source,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
