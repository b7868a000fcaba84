use pairmerge::align::{Aligner, BuiltinAligner, Fasta36Aligner};
use pairmerge::config::FailurePolicy;

use std::sync::Arc;
use std::time::Duration;

/// Pairwise aligner used by the aligner and reference stages.
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum AlignerBackend {
    /// the external `fasta36` program (override its location with FASTA36_PATH)
    #[value(name = "fasta36")]
    Fasta36,

    /// a built-in Smith-Waterman aligner, which needs no external program
    Builtin,

    /// skip the aligner stage; the reference stage then uses the built-in aligner
    #[value(name = "none")]
    Disabled,
}

/// Returns the aligner for a backend, or `None` if the aligner stage is disabled.
pub fn get_aligner(backend: AlignerBackend, timeout: Duration) -> Option<Arc<dyn Aligner>> {
    match backend {
        AlignerBackend::Fasta36 => Some(Arc::new(Fasta36Aligner::new(timeout))),
        AlignerBackend::Builtin => Some(Arc::new(BuiltinAligner::default())),
        AlignerBackend::Disabled => None,
    }
}

/// What happens to a pair when an external tool fails on it.
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum OnToolFailure {
    /// retry the failing stage, then send the pair to the chimeras
    Retry,

    /// send the pair to the chimeras straight away
    Chimera,
}

pub fn get_failure_policy(on_failure: OnToolFailure, retries: usize) -> FailurePolicy {
    match on_failure {
        OnToolFailure::Retry => FailurePolicy::Retry(retries),
        OnToolFailure::Chimera => FailurePolicy::Chimera,
    }
}
