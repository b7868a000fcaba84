use crate::record::{encode_qual, SequenceRecord, UNKNOWN_BASE};
use itertools::Itertools;

/// The single read reconstructed from a pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedRead {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl MergedRead {
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn encoded_qual(&self) -> String {
        encode_qual(&self.qual)
    }
}

/// Joins the forward read and the reverse complement of the reverse read, which overlap by
/// `overlap` bases starting `offset` bases into the forward read.
///
/// Inside the overlap, the base with the higher quality wins; ties go to the forward read.
pub fn merge_by_overlap(
    fwd: &SequenceRecord,
    rev_rc: &SequenceRecord,
    offset: usize,
    overlap: usize,
) -> MergedRead {
    debug_assert!(offset + overlap <= fwd.len() && overlap <= rev_rc.len());
    let overlap = overlap.min(fwd.len() - offset.min(fwd.len())).min(rev_rc.len());

    let mut seq = Vec::with_capacity(offset + rev_rc.len());
    let mut qual = Vec::with_capacity(offset + rev_rc.len());

    // the beginning comes from the forward read
    seq.extend_from_slice(&fwd.seq()[..offset]);
    qual.extend_from_slice(&fwd.qual()[..offset]);

    let fwd_window = fwd.seq()[offset..offset + overlap]
        .iter()
        .zip(&fwd.qual()[offset..offset + overlap]);
    let rev_window = rev_rc.seq()[..overlap]
        .iter()
        .zip(&rev_rc.qual()[..overlap]);

    for ((fb, fq), (rb, rq)) in fwd_window.zip_eq(rev_window) {
        let (b, q) = if fq >= rq { (fb, fq) } else { (rb, rq) };
        seq.push(*b);
        qual.push(*q);
    }

    // and the end from the reverse read
    seq.extend_from_slice(&rev_rc.seq()[overlap..]);
    qual.extend_from_slice(&rev_rc.qual()[overlap..]);

    MergedRead {
        id: fwd.id().to_string(),
        seq,
        qual,
    }
}

/// Joins two reads which do not overlap, filling the `gap` between them with unknown bases of
/// quality zero.
pub fn merge_with_gap(fwd: &SequenceRecord, rev_rc: &SequenceRecord, gap: usize) -> MergedRead {
    let seq = [fwd.seq(), &vec![UNKNOWN_BASE; gap][..], rev_rc.seq()].concat();
    let qual = [fwd.qual(), &vec![0u8; gap][..], rev_rc.qual()].concat();

    MergedRead {
        id: fwd.id().to_string(),
        seq,
        qual,
    }
}
