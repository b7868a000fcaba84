mod builtin;
mod process;
pub mod report;

pub use builtin::BuiltinAligner;
pub use process::run_tool;
pub use report::{Hit, Strand};

use crate::config::tool_path;
use crate::error::ToolError;

use std::io::Write;
use std::process::Command;
use std::time::Duration;
use tempfile::NamedTempFile;

/// A pairwise local aligner. Implementations return every reported alignment of `query`
/// against `subject`, best first; an empty list means the tool found nothing significant.
pub trait Aligner: Send + Sync {
    fn name(&self) -> &str;

    fn align(&self, query: &[u8], subject: &[u8]) -> Result<Vec<Hit>, ToolError>;
}

/// Aligns with the external `fasta36` program, on the forward strand only.
///
/// The binary is taken from the `FASTA36_PATH` environment variable, or `fasta36` on `PATH`.
pub struct Fasta36Aligner {
    program: String,
    timeout: Duration,
}

impl Fasta36Aligner {
    pub fn new(timeout: Duration) -> Self {
        Fasta36Aligner {
            program: tool_path("FASTA36_PATH", "fasta36"),
            timeout,
        }
    }
}

impl Aligner for Fasta36Aligner {
    fn name(&self) -> &str {
        "fasta36"
    }

    fn align(&self, query: &[u8], subject: &[u8]) -> Result<Vec<Hit>, ToolError> {
        let query_file = write_fasta(self.name(), "query", query)?;
        let subject_file = write_fasta(self.name(), "subject", subject)?;

        // -n: nucleotide, -f/-g: gap open/extend penalties, -m 8: tabular, -3: forward strand
        let report = run_tool(
            self.name(),
            Command::new(&self.program)
                .args(["-q", "-n", "-f", "20", "-g", "10", "-m", "8", "-3"])
                .arg(query_file.path())
                .arg(subject_file.path()),
            self.timeout,
        )?;

        report::parse_tabular(self.name(), &report)
    }
}

/// Writes a single sequence to a fresh temporary FASTA file. Every call gets its own file, so
/// concurrent invocations never share inputs.
pub(crate) fn write_fasta(tool: &str, id: &str, seq: &[u8]) -> Result<NamedTempFile, ToolError> {
    let mut file = tempfile::Builder::new()
        .suffix(".fasta")
        .tempfile()
        .map_err(|e| ToolError::io(tool, e))?;

    writeln!(file, ">{id}")
        .and_then(|_| file.write_all(seq))
        .and_then(|_| writeln!(file))
        .and_then(|_| file.flush())
        .map_err(|e| ToolError::io(tool, e))?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fasta_files_are_written() {
        let file = write_fasta("test", "seq1", b"ACGT").unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, ">seq1\nACGT\n");
    }

    #[test]
    fn missing_fasta36_is_a_tool_failure() {
        let aligner = Fasta36Aligner {
            program: String::from("/nonexistent/fasta36"),
            timeout: Duration::from_secs(1),
        };
        let err = aligner.align(b"ACGT", b"ACGT").unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
