use crate::align::{Aligner, BuiltinAligner, Hit};
use crate::config::ConstantParams;
use crate::error::InputError;
use crate::record::reverse_complement;

use anyhow::{Context, Result};
use std::path::Path;

/// Checks that a merged read contains the conserved region expected between two variable
/// regions (e.g. the constant stretch between V3 and V4). Reads lacking it are likely chimeras.
pub struct ConstantRegionValidator {
    marker: Vec<u8>,
    marker_rc: Vec<u8>,
    params: ConstantParams,
    aligner: BuiltinAligner,
}

impl ConstantRegionValidator {
    pub fn new(marker: Vec<u8>, params: ConstantParams) -> Self {
        let marker = marker.to_ascii_uppercase();
        ConstantRegionValidator {
            marker_rc: reverse_complement(&marker),
            marker,
            params,
            aligner: BuiltinAligner::new(1),
        }
    }

    /// Reads the marker from the first record of a FASTA file.
    pub fn from_fasta(path: &Path, params: ConstantParams) -> Result<Self> {
        let mut reader = needletail::parse_fastx_file(path)
            .with_context(|| format!("Unable to open constant region file {path:?}"))?;

        let rec = reader
            .next()
            .ok_or_else(|| InputError::EmptyFasta {
                path: path.to_path_buf(),
            })?
            .with_context(|| format!("Invalid record in {path:?}"))?;

        let marker = rec.seq().to_vec();
        if marker.is_empty() {
            return Err(InputError::EmptyFasta {
                path: path.to_path_buf(),
            }
            .into());
        }

        info!("Using a {} base constant region from {path:?}", marker.len());
        Ok(Self::new(marker, params))
    }

    pub fn marker_len(&self) -> usize {
        self.marker.len()
    }

    /// Returns true if the marker (on either strand) aligns well enough, and lies away from the
    /// ends of the merged read.
    pub fn validate(&self, merged: &[u8]) -> bool {
        [&self.marker, &self.marker_rc]
            .into_iter()
            .any(|marker| self.validate_strand(marker, merged))
    }

    fn validate_strand(&self, marker: &[u8], merged: &[u8]) -> bool {
        // the built-in aligner cannot fail
        let Ok(hits) = self.aligner.align(marker, merged) else {
            return false;
        };

        hits.iter().any(|hit| self.accept(hit, merged.len()))
    }

    fn accept(&self, hit: &Hit, merged_len: usize) -> bool {
        let covered = hit.q_end + 1 - hit.q_start;
        let coverage = covered as f64 / self.marker.len() as f64;

        let start = hit.s_start - 1;
        let end = hit.s_end;
        let margin = self.params.mid_margin;
        let centred = start >= margin && end + margin <= merged_len;

        coverage > self.params.min_coverage && hit.identity > self.params.min_identity && centred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::tests::random_seq;

    fn validator(marker: &[u8]) -> ConstantRegionValidator {
        ConstantRegionValidator::new(marker.to_vec(), ConstantParams::default())
    }

    #[test]
    fn marker_in_the_middle_is_found() {
        let marker = random_seq(60, 31);
        let merged = [random_seq(150, 32), marker.clone(), random_seq(150, 33)].concat();
        assert!(validator(&marker).validate(&merged));
    }

    #[test]
    fn marker_on_the_other_strand_is_found() {
        let marker = random_seq(60, 34);
        let merged = [
            random_seq(150, 35),
            reverse_complement(&marker),
            random_seq(150, 36),
        ]
        .concat();
        assert!(validator(&marker).validate(&merged));
    }

    #[test]
    fn a_few_mismatches_are_tolerated() {
        let marker = random_seq(60, 37);
        let mut noisy = marker.clone();
        for i in [10, 30, 50] {
            noisy[i] = if noisy[i] == b'A' { b'C' } else { b'A' };
        }
        let merged = [random_seq(150, 38), noisy, random_seq(150, 39)].concat();
        assert!(validator(&marker).validate(&merged));
    }

    #[test]
    fn missing_marker_fails() {
        let marker = random_seq(60, 40);
        let merged = random_seq(360, 41);
        assert!(!validator(&marker).validate(&merged));
    }

    #[test]
    fn marker_at_the_edge_fails() {
        let marker = random_seq(60, 42);
        let merged = [random_seq(10, 43), marker.clone(), random_seq(290, 44)].concat();
        assert!(!validator(&marker).validate(&merged));
    }

    #[test]
    fn reads_marker_from_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("const.fasta");
        std::fs::write(&path, ">V3V4\nACGTACGT\nTTGGCCAA\n").unwrap();

        let v = ConstantRegionValidator::from_fasta(&path, ConstantParams::default()).unwrap();
        assert_eq!(v.marker_len(), 16);
    }
}
