//! The merge decision engine.
//!
//! Every pair walks an ordered list of strategies (naive overlap, pairwise alignment, reference
//! placement) until one of them places the reads, and ends in exactly one of three categories:
//! merged, chimera or too short.

mod build;
mod stats;
mod strategy;

pub use build::{merge_by_overlap, merge_with_gap, MergedRead};
pub use stats::{MergingStats, StatsAccumulator};
pub use strategy::{AlignerStrategy, Attempt, MergeStrategy, NaiveStrategy, ReferenceStrategy};

use crate::align::{Aligner, BuiltinAligner};
use crate::config::{FailurePolicy, MergeConfig};
use crate::constant::ConstantRegionValidator;
use crate::error::ToolError;
use crate::overlap::OverlapDetector;
use crate::record::ReadPair;
use crate::reference::{Gap, ReferenceResolver, ReferenceSearch};

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Naive,
    Aligner,
    Reference,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Naive => "naive",
            Stage::Aligner => "aligner",
            Stage::Reference => "reference",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The three disjoint output categories.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Merged,
    Chimera,
    TooShort,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Merged => "merged",
            Category::Chimera => "chimera",
            Category::TooShort => "too_short",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChimeraReason {
    /// No strategy could place the reads.
    NoPlacement,
    /// The reads merged, but the merged read lacks the constant region.
    ConstantRegionMissing,
    /// An external tool kept failing; the pair was never placed.
    ToolFailure { stage: Stage, error: String },
}

/// Final classification of a pair.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Merged { read: MergedRead, stage: Stage },
    Chimera(ChimeraReason),
    TooShort { stage: Stage },
}

impl Verdict {
    pub fn category(&self) -> Category {
        match self {
            Verdict::Merged { .. } => Category::Merged,
            Verdict::Chimera(_) => Category::Chimera,
            Verdict::TooShort { .. } => Category::TooShort,
        }
    }

    pub fn is_tool_failure(&self) -> bool {
        matches!(self, Verdict::Chimera(ChimeraReason::ToolFailure { .. }))
    }
}

pub struct MergeEngine {
    strategies: Vec<Box<dyn MergeStrategy>>,
    constant: Option<ConstantRegionValidator>,
    policy: FailurePolicy,
}

impl MergeEngine {
    pub fn new(
        strategies: Vec<Box<dyn MergeStrategy>>,
        constant: Option<ConstantRegionValidator>,
        policy: FailurePolicy,
    ) -> Self {
        MergeEngine {
            strategies,
            constant,
            policy,
        }
    }

    /// The usual cascade: naive detection, then `aligner` if given, then `db` if given. The
    /// reference stage aligns with `aligner`, or the built-in aligner without one.
    pub fn standard(
        config: &MergeConfig,
        aligner: Option<Arc<dyn Aligner>>,
        db: Option<Box<dyn ReferenceSearch>>,
        constant: Option<ConstantRegionValidator>,
    ) -> Self {
        let mut strategies: Vec<Box<dyn MergeStrategy>> = vec![Box::new(NaiveStrategy::new(
            OverlapDetector::new(config.detector.clone(), config.min_overlap),
        ))];

        if let Some(aligner) = &aligner {
            strategies.push(Box::new(AlignerStrategy::new(
                aligner.clone(),
                config.geometry.clone(),
                config.min_overlap,
            )));
        }

        if let Some(db) = db {
            let aligner = aligner.unwrap_or_else(|| Arc::new(BuiltinAligner::default()));
            strategies.push(Box::new(ReferenceStrategy::new(ReferenceResolver::new(
                db,
                aligner,
                config.reference.clone(),
            ))));
        }

        Self::new(strategies, constant, config.failure_policy)
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.strategies.iter().map(|s| s.stage()).collect()
    }

    /// Runs the cascade on one pair.
    pub fn classify(&self, pair: &ReadPair) -> Verdict {
        for strategy in &self.strategies {
            let stage = strategy.stage();

            let attempt = match self.attempt(strategy.as_ref(), pair) {
                Ok(attempt) => attempt,
                Err(e) => {
                    return Verdict::Chimera(ChimeraReason::ToolFailure {
                        stage,
                        error: e.to_string(),
                    })
                }
            };

            match attempt {
                Attempt::Overlap(res) if res.is_short() => {
                    trace!("{}: too short at {stage}", pair.forward.id());
                    return Verdict::TooShort { stage };
                }
                Attempt::Overlap(res) if res.found => {
                    let rev_rc = pair.reverse.reverse_complement();
                    let read =
                        merge_by_overlap(&pair.forward, &rev_rc, res.offset, res.overlap_length);
                    return self.validate(read, stage);
                }
                Attempt::Reference(m) => {
                    if let Gap::Resolved(gap) = m.gap {
                        let rev_rc = pair.reverse.reverse_complement();
                        let read = merge_with_gap(&pair.forward, &rev_rc, gap);
                        return self.validate(read, stage);
                    }
                }
                _ => {}
            }
        }

        Verdict::Chimera(ChimeraReason::NoPlacement)
    }

    /// Calls a strategy under the failure policy.
    fn attempt(&self, strategy: &dyn MergeStrategy, pair: &ReadPair) -> Result<Attempt, ToolError> {
        let max_attempts = self.policy.max_attempts();
        let mut n = 1;
        loop {
            match strategy.attempt(pair) {
                Ok(attempt) => return Ok(attempt),
                Err(e) if n < max_attempts => {
                    warn!(
                        "{}: {} stage failed (attempt {n}/{max_attempts}), retrying: {e}",
                        pair.forward.id(),
                        strategy.stage()
                    );
                    n += 1;
                }
                Err(e) => {
                    warn!(
                        "{}: tool failure at {} stage, pair routed to chimera: {e}",
                        pair.forward.id(),
                        strategy.stage()
                    );
                    return Err(e);
                }
            }
        }
    }

    fn validate(&self, read: MergedRead, stage: Stage) -> Verdict {
        match &self.constant {
            Some(v) if !v.validate(&read.seq) => {
                debug!("{}: merged at {stage} but constant region missing", read.id);
                Verdict::Chimera(ChimeraReason::ConstantRegionMissing)
            }
            _ => Verdict::Merged { read, stage },
        }
    }
}
