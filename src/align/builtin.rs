use super::report::{Hit, Strand};
use super::Aligner;
use crate::error::ToolError;
use crate::record::UNKNOWN_BASE;

use bio::alignment::pairwise::Aligner as PairwiseAligner;
use bio::alignment::AlignmentOperation;

const MATCH: i32 = 2;
const MISMATCH: i32 = -3;
const GAP_OPEN: i32 = -5;
const GAP_EXTEND: i32 = -2;

/// In-process local aligner backed by `bio`. Produces the same hits as the tabular report of an
/// external aligner, so it can stand in for `fasta36` when it is not installed.
pub struct BuiltinAligner {
    min_score: i32,
}

impl BuiltinAligner {
    pub fn new(min_score: i32) -> Self {
        BuiltinAligner { min_score }
    }
}

impl Default for BuiltinAligner {
    fn default() -> Self {
        BuiltinAligner::new(20)
    }
}

impl Aligner for BuiltinAligner {
    fn name(&self) -> &str {
        "builtin"
    }

    fn align(&self, query: &[u8], subject: &[u8]) -> Result<Vec<Hit>, ToolError> {
        if query.is_empty() || subject.is_empty() {
            return Ok(Vec::new());
        }

        let score = |a: u8, b: u8| {
            if a == b && a != UNKNOWN_BASE {
                MATCH
            } else {
                MISMATCH
            }
        };
        let mut aligner = PairwiseAligner::with_capacity(
            query.len(),
            subject.len(),
            GAP_OPEN,
            GAP_EXTEND,
            &score,
        );
        let aln = aligner.local(query, subject);

        if aln.score < self.min_score {
            return Ok(Vec::new());
        }

        let mut matches = 0;
        let mut mismatches = 0;
        let mut length = 0;
        let mut gap_opens = 0;
        let mut in_gap = false;

        for op in aln.operations.iter() {
            match op {
                AlignmentOperation::Match => {
                    matches += 1;
                    length += 1;
                    in_gap = false;
                }
                AlignmentOperation::Subst => {
                    mismatches += 1;
                    length += 1;
                    in_gap = false;
                }
                AlignmentOperation::Del | AlignmentOperation::Ins => {
                    length += 1;
                    if !in_gap {
                        gap_opens += 1;
                    }
                    in_gap = true;
                }
                AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => {}
            }
        }

        if length == 0 {
            return Ok(Vec::new());
        }

        Ok(vec![Hit {
            query_id: String::from("query"),
            subject_id: String::from("subject"),
            identity: 100.0 * matches as f64 / length as f64,
            length,
            mismatches,
            gap_opens,
            q_start: aln.xstart + 1,
            q_end: aln.xend,
            s_start: aln.ystart + 1,
            s_end: aln.yend,
            evalue: None,
            bitscore: aln.score as f64,
            subject_acc: None,
            strand: Strand::Plus,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::tests::random_seq;

    #[test]
    fn finds_a_shared_segment() {
        let shared = random_seq(60, 11);
        let query = [random_seq(90, 12), shared.clone()].concat();
        let subject = [shared, random_seq(90, 13)].concat();

        let hits = BuiltinAligner::default().align(&query, &subject).unwrap();
        assert_eq!(hits.len(), 1);

        let hit = &hits[0];
        // the local alignment may extend a few bases by chance, but must cover the shared part
        assert!(hit.q_start <= 91 && hit.q_end == 150, "{hit:?}");
        assert!(hit.s_start == 1 && hit.s_end >= 60, "{hit:?}");
        assert!(hit.length >= 60);
    }

    #[test]
    fn low_scores_are_not_hits() {
        let hits = BuiltinAligner::new(1000)
            .align(b"ACGTACGTAC", b"ACGTACGTAC")
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn empty_input_has_no_hits() {
        assert!(BuiltinAligner::default().align(b"", b"ACGT").unwrap().is_empty());
    }
}
