//! Reference-guided placement of read pairs which do not overlap directly.
//!
//! The forward read is searched against a nucleotide database; the reverse read is then aligned
//! against the best reference, and the distance between the two placements on the reference
//! gives the length of the unobserved middle of the fragment.

use crate::align::{report, run_tool, write_fasta, Aligner, Hit, Strand};
use crate::config::{tool_path, ReferenceParams};
use crate::error::ToolError;
use crate::record::{reverse_complement, SequenceRecord};

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

/// A searchable reference database.
pub trait ReferenceSearch: Send + Sync {
    /// Finds references similar to `query`. No hits is not an error.
    fn search(&self, query: &[u8]) -> Result<Vec<Hit>, ToolError>;

    /// Retrieves the full sequence of a reference by the accession reported in a hit.
    fn fetch(&self, accession: &str) -> Result<Vec<u8>, ToolError>;
}

/// A BLAST nucleotide database, queried with `blastn` and read with `blastdbcmd`.
///
/// Binaries are taken from `BLASTN_PATH` and `BLASTDBCMD_PATH`, or from `PATH`.
pub struct BlastDatabase {
    db: PathBuf,
    blastn: String,
    blastdbcmd: String,
    timeout: Duration,
}

const BLAST_OUTFMT: &str = "6 qseqid sseqid pident length mismatch gapopen qstart qend sstart send evalue bitscore sacc sstrand";

impl BlastDatabase {
    pub fn new(db: impl Into<PathBuf>, timeout: Duration) -> Self {
        BlastDatabase {
            db: db.into(),
            blastn: tool_path("BLASTN_PATH", "blastn"),
            blastdbcmd: tool_path("BLASTDBCMD_PATH", "blastdbcmd"),
            timeout,
        }
    }
}

impl ReferenceSearch for BlastDatabase {
    fn search(&self, query: &[u8]) -> Result<Vec<Hit>, ToolError> {
        let query_file = write_fasta("blastn", "query", query)?;

        let report = run_tool(
            "blastn",
            Command::new(&self.blastn)
                .args(["-task", "blastn", "-ungapped", "-penalty", "-1", "-reward", "2"])
                .args(["-max_target_seqs", "1", "-outfmt", BLAST_OUTFMT])
                .arg("-query")
                .arg(query_file.path())
                .arg("-db")
                .arg(&self.db),
            self.timeout,
        )?;

        report::parse_tabular("blastn", &report)
    }

    fn fetch(&self, accession: &str) -> Result<Vec<u8>, ToolError> {
        let fasta = run_tool(
            "blastdbcmd",
            Command::new(&self.blastdbcmd)
                .arg("-db")
                .arg(&self.db)
                .args(["-entry", accession]),
            self.timeout,
        )?;

        let mut reader = needletail::parse_fastx_reader(std::io::Cursor::new(fasta.into_bytes()))
            .map_err(|e| ToolError::malformed("blastdbcmd", e.to_string()))?;

        let rec = reader
            .next()
            .ok_or_else(|| ToolError::malformed("blastdbcmd", format!("no entry `{accession}`")))?
            .map_err(|e| ToolError::malformed("blastdbcmd", e.to_string()))?;

        Ok(normalize_bases(&rec.seq()))
    }
}

/// Upper-cases a reference and replaces ambiguity codes with `N`.
fn normalize_bases(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .map(|b| match b.to_ascii_uppercase() {
            b @ (b'A' | b'C' | b'G' | b'T') => b,
            _ => b'N',
        })
        .collect()
}

/// Distance between the end of the forward read and the start of the reverse read on the
/// reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Gap {
    Resolved(usize),
    /// The placements overlap, or lie implausibly far apart.
    Unresolvable,
}

#[derive(Clone, Debug)]
pub struct ReferenceMatch {
    pub reference_id: String,
    pub reference_region: Vec<u8>,
    /// Forward read against the reference, on the reference's plus strand.
    pub forward_alignment: Hit,
    /// Reverse complement of the reverse read against the reference.
    pub reverse_alignment: Hit,
    pub gap: Gap,
}

pub struct ReferenceResolver {
    db: Box<dyn ReferenceSearch>,
    aligner: Arc<dyn Aligner>,
    params: ReferenceParams,
}

impl ReferenceResolver {
    pub fn new(
        db: Box<dyn ReferenceSearch>,
        aligner: Arc<dyn Aligner>,
        params: ReferenceParams,
    ) -> Self {
        ReferenceResolver {
            db,
            aligner,
            params,
        }
    }

    /// Places both reads of a pair on the reference which best matches the forward read.
    ///
    /// The forward read is used for the search because its 5' end has the higher quality.
    /// Returns `Ok(None)` if either read cannot be placed.
    pub fn resolve(
        &self,
        forward: &SequenceRecord,
        reverse: &SequenceRecord,
    ) -> Result<Option<ReferenceMatch>, ToolError> {
        let Some(best) = self.db.search(forward.seq())?.into_iter().min_by(Hit::rank) else {
            debug!("{}: no reference hit for forward read", forward.id());
            return Ok(None);
        };

        let reference_id = best
            .subject_acc
            .clone()
            .unwrap_or_else(|| best.subject_id.clone());
        let mut reference = self.db.fetch(&reference_id)?;

        if best.s_max() > reference.len() {
            return Err(ToolError::malformed(
                "blastdbcmd",
                format!(
                    "hit ends at {} but reference `{reference_id}` has {} bases",
                    best.s_max(),
                    reference.len()
                ),
            ));
        }

        if !self.anchored(&best, forward.len()) {
            debug!("{}: reference hit covers too little of the forward read", forward.id());
            return Ok(None);
        }

        let forward_alignment = match best.strand {
            Strand::Plus => best,
            Strand::Minus => {
                reference = reverse_complement(&reference);
                mirror(best, reference.len())
            }
        };

        let rev_rc = reverse_complement(reverse.seq());
        let Some(reverse_alignment) = self
            .aligner
            .align(&rev_rc, &reference)?
            .into_iter()
            .min_by(Hit::rank)
        else {
            debug!("{}: reverse read does not align to {reference_id}", reverse.id());
            return Ok(None);
        };

        if !self.anchored(&reverse_alignment, reverse.len()) {
            debug!(
                "{}: alignment to {reference_id} covers too little of the reverse read",
                reverse.id()
            );
            return Ok(None);
        }

        let gap = self.estimate_gap(
            &forward_alignment,
            forward.len(),
            &reverse_alignment,
        );

        Ok(Some(ReferenceMatch {
            reference_id,
            reference_region: reference,
            forward_alignment,
            reverse_alignment,
            gap,
        }))
    }

    /// Whether a hit places a read of `read_len` bases: it must start near the 5' end of the
    /// read and cover a large enough share of it. Short chance alignments against a long
    /// reference fail this.
    fn anchored(&self, hit: &Hit, read_len: usize) -> bool {
        let covered = (hit.q_end + 1).saturating_sub(hit.q_start);
        hit.q_start <= self.params.max_align_offset
            && covered as f64 >= self.params.min_read_coverage * read_len as f64
    }

    fn estimate_gap(&self, fwd: &Hit, fwd_len: usize, rev: &Hit) -> Gap {
        // 0-based reference position of the first base of each read
        let fwd_start = fwd.s_start as i64 - fwd.q_start as i64;
        let fwd_end = fwd_start + fwd_len as i64;
        let rev_start = rev.s_start as i64 - rev.q_start as i64;

        let gap = rev_start - fwd_end;
        if gap < 0 || gap > self.params.max_gap as i64 {
            Gap::Unresolvable
        } else {
            Gap::Resolved(gap as usize)
        }
    }
}

/// Re-expresses a minus-strand hit against the reverse complement of its subject.
fn mirror(hit: Hit, subject_len: usize) -> Hit {
    let flip = |p: usize| subject_len + 1 - p;
    Hit {
        s_start: flip(hit.s_start),
        s_end: flip(hit.s_end),
        strand: Strand::Plus,
        ..hit
    }
}
