use serde::Serialize;
use std::time::Duration;

/// Parameters of the naive sliding-window overlap detector.
#[derive(Clone, Debug, Serialize)]
pub struct DetectorParams {
    /// Length of the forward read's 3' tail which is slid along the reverse read.
    pub tail_len: usize,
    /// Largest shift of the tail into the reverse read's reverse complement.
    pub max_shift: usize,
    /// Minimum fraction of matching bases for a window to be accepted (inclusive).
    pub min_identity: f64,
    /// Shortest partial window which is still tested. Windows shorter than this match by chance
    /// too often to mean anything.
    pub min_probe_len: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        DetectorParams {
            tail_len: 20,
            max_shift: 120,
            min_identity: 0.90,
            min_probe_len: 5,
        }
    }
}

/// Limits applied when interpreting a pairwise alignment of the two reads.
#[derive(Clone, Debug, Serialize)]
pub struct GeometryParams {
    /// An alignment starting or ending further than this from the read ends is considered to be
    /// a random hit in the middle of the reads.
    pub max_align_offset: usize,
}

impl Default for GeometryParams {
    fn default() -> Self {
        GeometryParams {
            max_align_offset: 40,
        }
    }
}

/// Limits of the reference-guided placement and gap estimate.
#[derive(Clone, Debug, Serialize)]
pub struct ReferenceParams {
    /// Longest gap between the reads which is still credible.
    pub max_gap: usize,
    /// Minimum fraction of each read which its alignment to the reference must cover.
    pub min_read_coverage: f64,
    /// A read alignment must start within this many bases of the read's 5' end.
    pub max_align_offset: usize,
}

impl Default for ReferenceParams {
    fn default() -> Self {
        ReferenceParams {
            max_gap: 90,
            min_read_coverage: 0.5,
            max_align_offset: 40,
        }
    }
}

/// Acceptance thresholds for the constant region between two variable regions.
#[derive(Clone, Debug, Serialize)]
pub struct ConstantParams {
    /// Minimum fraction of the marker which must be aligned (exclusive).
    pub min_coverage: f64,
    /// Minimum percent identity of the aligned marker (exclusive).
    pub min_identity: f64,
    /// The marker must start and end at least this many bases away from the read ends.
    pub mid_margin: usize,
}

impl Default for ConstantParams {
    fn default() -> Self {
        ConstantParams {
            min_coverage: 0.90,
            min_identity: 80.0,
            mid_margin: 70,
        }
    }
}

/// What to do with a pair when an external tool fails while processing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FailurePolicy {
    /// Route the pair to the chimera output straight away.
    Chimera,
    /// Retry the failed stage up to this many more times, then route the pair to the chimera
    /// output.
    Retry(usize),
}

impl FailurePolicy {
    pub fn max_attempts(&self) -> usize {
        match self {
            FailurePolicy::Chimera => 1,
            FailurePolicy::Retry(n) => n + 1,
        }
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Retry(2)
    }
}

/// Every tunable of a merging run.
#[derive(Clone, Debug, Serialize)]
pub struct MergeConfig {
    pub detector: DetectorParams,
    pub geometry: GeometryParams,
    pub reference: ReferenceParams,
    pub constant: ConstantParams,
    /// Overlaps shorter than this are primer-annealing artifacts, and the pair is too short.
    pub min_overlap: usize,
    pub failure_policy: FailurePolicy,
    /// Upper bound on the runtime of a single external tool invocation.
    #[serde(serialize_with = "serialize_secs")]
    pub timeout: Duration,
    pub threads: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            detector: DetectorParams::default(),
            geometry: GeometryParams::default(),
            reference: ReferenceParams::default(),
            constant: ConstantParams::default(),
            min_overlap: 11,
            failure_policy: FailurePolicy::default(),
            timeout: Duration::from_secs(60),
            threads: 1,
        }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Path of an external tool, which can be overridden by an environment variable.
pub fn tool_path(env_var: &str, default: &str) -> String {
    match std::env::var(env_var) {
        Ok(v) => v,
        Err(_) => String::from(default),
    }
}
