use crate::config::DetectorParams;
use crate::record::{SequenceRecord, UNKNOWN_BASE};

/// How the two reads of a pair lie relative to one another.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Orientation {
    /// ```text
    /// FFFFFFFF----
    /// ----RRRRRRRR
    /// ```
    Normal,
    /// The overlap is shorter than the minimum usable length, or the reads run past each other
    /// because the fragment is shorter than the reads:
    /// ```text
    /// --FFFFFF
    /// RRRRRR--
    /// ```
    Short,
}

/// Placement of the reverse read's reverse complement against the forward read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlapResult {
    pub found: bool,
    /// Number of forward bases before the overlap starts.
    pub offset: usize,
    pub overlap_length: usize,
    pub orientation: Orientation,
    pub mismatches: usize,
}

impl OverlapResult {
    pub fn not_found() -> Self {
        OverlapResult {
            found: false,
            offset: 0,
            overlap_length: 0,
            orientation: Orientation::Normal,
            mismatches: 0,
        }
    }

    /// Builds a found overlap of `overlap_length` bases against a forward read of length
    /// `forward_len`, classifying its orientation.
    pub fn placed(
        forward_len: usize,
        overlap_length: usize,
        mismatches: usize,
        min_overlap: usize,
    ) -> Self {
        let staggered = overlap_length > forward_len;
        let orientation = if staggered || overlap_length < min_overlap {
            Orientation::Short
        } else {
            Orientation::Normal
        };

        OverlapResult {
            found: true,
            offset: forward_len.saturating_sub(overlap_length),
            overlap_length,
            orientation,
            mismatches,
        }
    }

    /// A found overlap in which the reverse read starts before the forward read.
    pub fn staggered(overlap_length: usize, mismatches: usize) -> Self {
        OverlapResult {
            found: true,
            offset: 0,
            overlap_length,
            orientation: Orientation::Short,
            mismatches,
        }
    }

    pub fn is_short(&self) -> bool {
        self.found && self.orientation == Orientation::Short
    }
}

/// Naive overlap search: slides the 3' tail of the forward read along the reverse complement of
/// the reverse read, from the largest overlap to the smallest, and accepts the first window whose
/// identity reaches the threshold.
pub struct OverlapDetector {
    params: DetectorParams,
    min_overlap: usize,
}

impl OverlapDetector {
    pub fn new(params: DetectorParams, min_overlap: usize) -> Self {
        OverlapDetector {
            params,
            min_overlap,
        }
    }

    pub fn detect(&self, forward: &SequenceRecord, reverse: &SequenceRecord) -> OverlapResult {
        let rc = reverse.reverse_complement();
        self.detect_rc(forward.seq(), rc.seq())
    }

    /// Same as `detect`, for a reverse read which has already been reverse complemented.
    pub fn detect_rc(&self, fwd: &[u8], rev_rc: &[u8]) -> OverlapResult {
        let tail_len = self.params.tail_len.min(fwd.len());
        if tail_len == 0 || rev_rc.len() < tail_len.min(self.params.min_probe_len.max(1)) {
            return OverlapResult::not_found();
        }
        let tail = &fwd[fwd.len() - tail_len..];

        // full tail windows, largest overlap first
        if rev_rc.len() >= tail_len {
            let max_shift = self.params.max_shift.min(rev_rc.len() - tail_len);
            for shift in (0..=max_shift).rev() {
                let window = &rev_rc[shift..shift + tail_len];
                if let Some(mismatches) = self.accept(tail, window) {
                    return OverlapResult::placed(
                        fwd.len(),
                        shift + tail_len,
                        mismatches,
                        self.min_overlap,
                    );
                }
            }
        }

        // overlaps shorter than the tail itself
        let longest_partial = (tail_len - 1).min(rev_rc.len());
        let shortest_partial = self.params.min_probe_len.max(1);
        for len in (shortest_partial..=longest_partial).rev() {
            let fwd_end = &fwd[fwd.len() - len..];
            if let Some(mismatches) = self.accept(fwd_end, &rev_rc[..len]) {
                return OverlapResult::placed(fwd.len(), len, mismatches, self.min_overlap);
            }
        }

        OverlapResult::not_found()
    }

    /// Returns the mismatch count if the two equal-length windows are similar enough.
    fn accept(&self, a: &[u8], b: &[u8]) -> Option<usize> {
        let mismatches = count_mismatches(a, b);
        let identity = (a.len() - mismatches) as f64 / a.len() as f64;
        (identity >= self.params.min_identity).then_some(mismatches)
    }
}

/// Number of differing positions between two equal-length windows. Unknown bases never match.
pub fn count_mismatches(a: &[u8], b: &[u8]) -> usize {
    a.iter()
        .zip(b)
        .filter(|(x, y)| x != y || **x == UNKNOWN_BASE)
        .count()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record::reverse_complement;

    /// Deterministic pseudo-random bases, so that tests do not depend on a RNG crate.
    pub(crate) fn random_seq(len: usize, seed: u64) -> Vec<u8> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                b"ACGT"[(state >> 32) as usize % 4]
            })
            .collect()
    }

    pub(crate) fn record(id: &str, seq: &[u8], q: u8) -> SequenceRecord {
        SequenceRecord::new(id, seq.to_vec(), vec![q; seq.len()]).unwrap()
    }

    /// Splits `fragment` into a forward read of `read_len` bases from the left, and a reverse
    /// read of `read_len` bases from the right (reverse complemented, as sequenced).
    pub(crate) fn pair_from_fragment(
        fragment: &[u8],
        read_len: usize,
    ) -> (SequenceRecord, SequenceRecord) {
        let fwd = &fragment[..read_len];
        let rev = reverse_complement(&fragment[fragment.len() - read_len..]);
        (record("f", fwd, 30), record("r", &rev, 30))
    }

    fn detector(min_overlap: usize) -> OverlapDetector {
        OverlapDetector::new(DetectorParams::default(), min_overlap)
    }

    #[test]
    fn exact_overlap_at_known_offset() {
        // 150 + 150 - 60 = 240 base fragment, overlap of 60
        let fragment = random_seq(240, 1);
        let (fwd, rev) = pair_from_fragment(&fragment, 150);

        let res = detector(11).detect(&fwd, &rev);
        assert!(res.found);
        assert_eq!(res.orientation, Orientation::Normal);
        assert_eq!(res.overlap_length, 60);
        assert_eq!(res.offset, 90);
        assert_eq!(res.mismatches, 0);
    }

    #[test]
    fn mismatches_within_tolerance_are_accepted() {
        let fragment = random_seq(240, 2);
        let (fwd, rev) = pair_from_fragment(&fragment, 150);

        // one mismatch in the 20 base tail leaves 95% identity
        let mut seq = fwd.seq().to_vec();
        seq[140] = if seq[140] == b'A' { b'C' } else { b'A' };
        let fwd = record("f", &seq, 30);

        let res = detector(11).detect(&fwd, &rev);
        assert!(res.found);
        assert_eq!(res.offset, 90);
        assert_eq!(res.mismatches, 1);
    }

    #[test]
    fn mismatches_above_tolerance_reject_the_offset() {
        let fragment = random_seq(240, 3);
        let (fwd, rev) = pair_from_fragment(&fragment, 150);

        // three mismatches in the tail: 85% identity, below the 90% threshold
        let mut seq = fwd.seq().to_vec();
        for i in [131, 139, 147] {
            seq[i] = if seq[i] == b'A' { b'C' } else { b'A' };
        }
        let fwd = record("f", &seq, 30);

        let res = detector(11).detect(&fwd, &rev);
        assert!(!res.found || res.offset != 90);
    }

    #[test]
    fn unrelated_reads_do_not_overlap() {
        // forward over {A,C}, reverse complement over {G,T}: no position can ever match
        let to_ac = |s: Vec<u8>| -> Vec<u8> {
            s.into_iter()
                .map(|b| if b == b'A' || b == b'G' { b'A' } else { b'C' })
                .collect()
        };
        let fwd = record("f", &to_ac(random_seq(150, 4)), 30);
        let rev = record("r", &to_ac(random_seq(150, 5)), 30);
        assert!(!detector(11).detect(&fwd, &rev).found);
    }

    #[test]
    fn overlap_below_minimum_is_short() {
        // 5 base overlap against a 10 base minimum
        let fragment = random_seq(295, 6);
        let (fwd, rev) = pair_from_fragment(&fragment, 150);

        let res = detector(10).detect(&fwd, &rev);
        assert!(res.found);
        assert_eq!(res.overlap_length, 5);
        assert_eq!(res.orientation, Orientation::Short);
        assert!(res.is_short());
    }

    #[test]
    fn reads_longer_than_fragment_are_short() {
        // fragment of 100 bases read with 150 base reads: the reverse read starts before the
        // forward read. Simulate read-through with a shared adapter-free core.
        let fragment = random_seq(100, 7);
        let fwd = record("f", &fragment, 30);
        let rev_rc: Vec<u8> = [random_seq(30, 8), fragment.clone()].concat();
        let rev = record("r", &reverse_complement(&rev_rc), 30);

        let res = detector(11).detect(&fwd, &rev);
        assert!(res.found);
        assert_eq!(res.overlap_length, 130);
        assert_eq!(res.orientation, Orientation::Short);
    }

    #[test]
    fn unknown_bases_count_as_mismatches() {
        assert_eq!(count_mismatches(b"ACGN", b"ACGN"), 1);
        assert_eq!(count_mismatches(b"ACGT", b"ACGT"), 0);
        assert_eq!(count_mismatches(b"AAAA", b"TTTT"), 4);
    }

    #[test]
    fn empty_reads_do_not_panic() {
        let empty = record("e", b"", 30);
        let fwd = record("f", &random_seq(50, 9), 30);
        assert!(!detector(11).detect(&empty, &fwd).found);
        assert!(!detector(11).detect(&fwd, &empty).found);
    }
}
