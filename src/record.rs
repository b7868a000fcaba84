use crate::error::InputError;
use needletail::parser::SequenceRecord as NeedletailRecord;

/// Offset of the Phred+33 encoding used by Illumina FASTQ files.
pub const PHRED_OFFSET: u8 = 33;

/// Symbol used for bases which are not observed, e.g. a gap filled from a reference.
pub const UNKNOWN_BASE: u8 = b'N';

/// A single read: identifier, bases over `ACGTN`, and one numeric Phred score per base.
///
/// Records are immutable once constructed; every constructor checks that there is exactly one
/// quality score per base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceRecord {
    id: String,
    seq: Vec<u8>,
    qual: Vec<u8>,
}

impl SequenceRecord {
    /// Creates a record from upper-case bases and *decoded* quality scores.
    pub fn new(id: impl Into<String>, seq: Vec<u8>, qual: Vec<u8>) -> Result<Self, InputError> {
        let id = id.into();

        if seq.len() != qual.len() {
            return Err(InputError::QualityLength {
                id,
                seq_len: seq.len(),
                qual_len: qual.len(),
            });
        }

        if let Some(pos) = seq.iter().position(|b| !is_valid_base(*b)) {
            return Err(InputError::InvalidBase {
                id,
                base: seq[pos] as char,
                pos,
            });
        }

        Ok(SequenceRecord { id, seq, qual })
    }

    /// Creates a record from FASTQ text, i.e. with Phred+33 encoded qualities. Lower-case bases
    /// are accepted and upper-cased.
    pub fn from_fastq_parts(id: &str, seq: &[u8], qual: &[u8]) -> Result<Self, InputError> {
        let seq = seq.to_ascii_uppercase();
        let qual = qual.iter().map(|q| q.saturating_sub(PHRED_OFFSET)).collect();
        Self::new(id, seq, qual)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn seq(&self) -> &[u8] {
        &self.seq
    }

    pub fn qual(&self) -> &[u8] {
        &self.qual
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Quality string re-encoded as Phred+33 text.
    pub fn encoded_qual(&self) -> String {
        encode_qual(&self.qual)
    }

    /// The reverse complement of the bases together with the reversed qualities, so that the
    /// read can be compared base-by-base with a read from the opposite strand.
    pub fn reverse_complement(&self) -> SequenceRecord {
        SequenceRecord {
            id: self.id.clone(),
            seq: reverse_complement(&self.seq),
            qual: self.qual.iter().rev().copied().collect(),
        }
    }

    /// Returns a copy with the first `n` bases (and their qualities) removed.
    pub fn trim_start(&self, n: usize) -> SequenceRecord {
        let n = n.min(self.len());
        SequenceRecord {
            id: self.id.clone(),
            seq: self.seq[n..].to_vec(),
            qual: self.qual[n..].to_vec(),
        }
    }
}

impl<'a> TryFrom<NeedletailRecord<'a>> for SequenceRecord {
    type Error = InputError;

    fn try_from(rec: NeedletailRecord<'a>) -> Result<Self, Self::Error> {
        let id = String::from_utf8_lossy(rec.id()).to_string();
        let Some(qual) = rec.qual() else {
            return Err(InputError::MissingQualities { id });
        };

        Self::from_fastq_parts(&id, &rec.seq(), qual)
    }
}

/// A forward/reverse read pair. `index` is the 0-based position of the pair in the input files,
/// and identifies the pair throughout a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadPair {
    pub index: usize,
    pub forward: SequenceRecord,
    pub reverse: SequenceRecord,
}

fn is_valid_base(b: u8) -> bool {
    matches!(b, b'A' | b'C' | b'G' | b'T' | b'N')
}

pub fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'T' | b'U' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        _ => b'N',
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|b| complement(*b)).collect()
}

pub fn encode_qual(qual: &[u8]) -> String {
    qual.iter().map(|q| q.saturating_add(PHRED_OFFSET) as char).collect()
}
