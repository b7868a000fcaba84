use std::path::PathBuf;
use thiserror::Error;

/// Problems with the input data. These are always fatal and are raised before any output is
/// written.
#[derive(Error, Debug)]
pub enum InputError {
    #[error(
        "unequal number of reads:
    {forward_path:?} has {forward} reads
    {reverse_path:?} has {reverse} reads
forward and reverse files must contain the same reads in the same order"
    )]
    UnequalPairCounts {
        forward_path: PathBuf,
        reverse_path: PathBuf,
        forward: usize,
        reverse: usize,
    },

    #[error("could not parse record {index} of {path:?}: {reason}")]
    CorruptRecord {
        path: PathBuf,
        index: usize,
        reason: String,
    },

    #[error("read `{id}` contains an invalid base `{base}` at position {pos}")]
    InvalidBase { id: String, base: char, pos: usize },

    #[error("read `{id}` has {seq_len} bases but {qual_len} quality scores")]
    QualityLength {
        id: String,
        seq_len: usize,
        qual_len: usize,
    },

    #[error("read `{id}` has no quality scores; FASTQ input is required")]
    MissingQualities { id: String },

    #[error("primer `{id}` contains symbols which are not IUPAC nucleotide codes: {symbols}")]
    InvalidPrimer { id: String, symbols: String },

    #[error("no sequences found in {path:?}")]
    EmptyFasta { path: PathBuf },
}

/// Failure of an external tool. This is distinct from a tool legitimately reporting no hits,
/// which is never an error.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("could not start `{tool}`: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    #[error("`{tool}` exited with status {code:?}:\n{stderr}")]
    ExitStatus {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{tool}` did not finish within {secs:.1}s and was killed")]
    Timeout { tool: String, secs: f64 },

    #[error("could not parse output of `{tool}`: {reason}")]
    Malformed { tool: String, reason: String },

    #[error("I/O error while running `{tool}`: {source}")]
    Io {
        tool: String,
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn io(tool: &str, source: std::io::Error) -> Self {
        ToolError::Io {
            tool: tool.to_string(),
            source,
        }
    }

    pub fn malformed(tool: &str, reason: impl Into<String>) -> Self {
        ToolError::Malformed {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("statistics accessed before merging: run `merge_reads` to completion first")]
    StatsNotReady,
}
