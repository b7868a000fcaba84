use super::Stage;
use crate::align::{Aligner, Hit, Strand};
use crate::config::GeometryParams;
use crate::error::ToolError;
use crate::overlap::{OverlapDetector, OverlapResult};
use crate::record::ReadPair;
use crate::reference::{Gap, ReferenceMatch, ReferenceResolver};

use std::sync::Arc;

/// Outcome of one strategy on one pair.
#[derive(Clone, Debug)]
pub enum Attempt {
    /// The reads overlap. Always `found`; the orientation decides between merged and too short.
    Overlap(OverlapResult),
    /// Both reads were placed on a reference with a resolvable gap between them.
    Reference(ReferenceMatch),
    NotFound,
}

/// One step of the merging cascade. Strategies are tried in order until one places the pair.
pub trait MergeStrategy: Send + Sync {
    fn stage(&self) -> Stage;

    /// Tries to place the two reads relative to each other. `Err` means an external tool failed,
    /// which is different from the strategy finding nothing.
    fn attempt(&self, pair: &ReadPair) -> Result<Attempt, ToolError>;
}

/// Sliding-window comparison of the forward tail against the reverse read.
pub struct NaiveStrategy {
    detector: OverlapDetector,
}

impl NaiveStrategy {
    pub fn new(detector: OverlapDetector) -> Self {
        NaiveStrategy { detector }
    }
}

impl MergeStrategy for NaiveStrategy {
    fn stage(&self) -> Stage {
        Stage::Naive
    }

    fn attempt(&self, pair: &ReadPair) -> Result<Attempt, ToolError> {
        let res = self.detector.detect(&pair.forward, &pair.reverse);
        Ok(if res.found {
            Attempt::Overlap(res)
        } else {
            Attempt::NotFound
        })
    }
}

/// Local alignment of the forward read against the reverse complement of the reverse read.
pub struct AlignerStrategy {
    aligner: Arc<dyn Aligner>,
    geometry: GeometryParams,
    min_overlap: usize,
}

impl AlignerStrategy {
    pub fn new(aligner: Arc<dyn Aligner>, geometry: GeometryParams, min_overlap: usize) -> Self {
        AlignerStrategy {
            aligner,
            geometry,
            min_overlap,
        }
    }

    /// Reads the overlap off the best alignment.
    ///
    /// # Arguments
    ///
    /// * `hit` - alignment with the forward read as query and the reverse complement of the
    ///   reverse read as subject.
    /// * `len_f`, `len_r` - lengths of the two reads.
    ///
    /// # Returns
    ///
    /// `None` if the alignment does not join the end of the forward read to the start of the
    /// reverse read, which happens when a random stretch in the middle of both reads aligns.
    fn interpret(&self, hit: &Hit, len_f: usize, len_r: usize) -> Option<OverlapResult> {
        if hit.strand == Strand::Minus {
            return None;
        }

        let max_offset = self.geometry.max_align_offset;
        if len_f.saturating_sub(hit.q_end) > max_offset || hit.s_start > max_offset {
            return None;
        }

        // --FFFFFF
        // RRRRRR--
        if hit.q_start < hit.s_start || hit.q_end * len_r < hit.s_end * len_f {
            return Some(OverlapResult::staggered(hit.length, hit.mismatches));
        }

        let offset = hit.q_start - hit.s_start;
        let overlap = len_f - offset.min(len_f);
        if overlap > len_r {
            return Some(OverlapResult::staggered(overlap, hit.mismatches));
        }

        Some(OverlapResult::placed(
            len_f,
            overlap,
            hit.mismatches,
            self.min_overlap,
        ))
    }
}

impl MergeStrategy for AlignerStrategy {
    fn stage(&self) -> Stage {
        Stage::Aligner
    }

    fn attempt(&self, pair: &ReadPair) -> Result<Attempt, ToolError> {
        let rev_rc = pair.reverse.reverse_complement();
        let hits = self.aligner.align(pair.forward.seq(), rev_rc.seq())?;

        let Some(best) = hits.iter().min_by(|a, b| Hit::rank(a, b)) else {
            return Ok(Attempt::NotFound);
        };

        Ok(
            match self.interpret(best, pair.forward.len(), pair.reverse.len()) {
                Some(res) => Attempt::Overlap(res),
                None => {
                    debug!(
                        "{}: alignment {}..{} / {}..{} is internal",
                        pair.forward.id(),
                        best.q_start,
                        best.q_end,
                        best.s_start,
                        best.s_end
                    );
                    Attempt::NotFound
                }
            },
        )
    }
}

/// Places the reads on the best matching reference sequence.
pub struct ReferenceStrategy {
    resolver: ReferenceResolver,
}

impl ReferenceStrategy {
    pub fn new(resolver: ReferenceResolver) -> Self {
        ReferenceStrategy { resolver }
    }
}

impl MergeStrategy for ReferenceStrategy {
    fn stage(&self) -> Stage {
        Stage::Reference
    }

    fn attempt(&self, pair: &ReadPair) -> Result<Attempt, ToolError> {
        match self.resolver.resolve(&pair.forward, &pair.reverse)? {
            Some(m) if matches!(m.gap, Gap::Resolved(_)) => Ok(Attempt::Reference(m)),
            Some(m) => {
                debug!(
                    "{}: placements on {} leave no credible gap",
                    pair.forward.id(),
                    m.reference_id
                );
                Ok(Attempt::NotFound)
            }
            None => Ok(Attempt::NotFound),
        }
    }
}
