use super::{Category, Verdict};
use crate::error::MergeError;

use indexmap::IndexMap;
use serde::Serialize;

/// Counts of pairs per output category.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergingStats {
    pub merged: usize,
    pub chimera: usize,
    pub too_short: usize,
    /// Chimeras which were classified as such because an external tool failed. Included in
    /// `chimera`.
    pub tool_failures: usize,
}

impl MergingStats {
    pub fn total(&self) -> usize {
        self.merged + self.chimera + self.too_short
    }

    pub fn as_map(&self) -> IndexMap<&'static str, usize> {
        IndexMap::from([
            (Category::Merged.name(), self.merged),
            (Category::Chimera.name(), self.chimera),
            (Category::TooShort.name(), self.too_short),
            ("tool_failures", self.tool_failures),
        ])
    }
}

/// Run-scoped accumulator for `MergingStats`. The counts can only be read once the run that
/// produced them has finished.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    counts: MergingStats,
    ready: bool,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the counts at the start of a run.
    pub fn start(&mut self) {
        self.counts = MergingStats::default();
        self.ready = false;
    }

    /// Counts one classified pair.
    pub fn record(&mut self, verdict: &Verdict) {
        match verdict.category() {
            Category::Merged => self.counts.merged += 1,
            Category::Chimera => self.counts.chimera += 1,
            Category::TooShort => self.counts.too_short += 1,
        }
        if verdict.is_tool_failure() {
            self.counts.tool_failures += 1;
        }
    }

    pub fn finish(&mut self) {
        self.ready = true;
    }

    pub fn get(&self) -> Result<&MergingStats, MergeError> {
        if self.ready {
            Ok(&self.counts)
        } else {
            Err(MergeError::StatsNotReady)
        }
    }
}
