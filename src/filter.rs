//! Cross-talk filtering: pairs in which neither read starts with one of the amplicon primers
//! most likely belong to another sample, and are set aside.

use crate::io::{self, read_pairs, write_record};
use crate::primers::PrimerFinder;
use crate::record::ReadPair;
use crate::run::Progress;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use rayon::prelude::*;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Fraction of the pairs between two progress lines.
const PROGRESS_STEP: f64 = 0.05;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    /// Pairs in which at least one read carries a primer.
    pub kept: usize,
    pub trashed: usize,
}

/// Name of a read file without its FASTQ (and gzip) extension.
fn sample_name(path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid read file name {path:?}"))?;

    let re = Regex::new(r"^(.*)\.f(ast)?q(\.gz)?$")?;
    Ok(match re.captures(file_name) {
        Some(c) => c[1].to_string(),
        None => file_name.to_string(),
    })
}

/// Checks both reads of a pair for a primer. With `cutoff`, primers are removed from the reads
/// which carry them.
fn classify(finder: &PrimerFinder, pair: &ReadPair, cutoff: bool) -> Option<ReadPair> {
    let fwd = finder.find(pair.forward.seq());
    let rev = finder.find(pair.reverse.seq());
    if fwd.is_none() && rev.is_none() {
        return None;
    }

    if !cutoff {
        return Some(pair.clone());
    }
    Some(ReadPair {
        index: pair.index,
        forward: pair.forward.trim_start(fwd.unwrap_or(0)),
        reverse: pair.reverse.trim_start(rev.unwrap_or(0)),
    })
}

/// Splits a pair of read files into primer-carrying (`<name>.16S.fastq`) and cross-talk
/// (`<name>.trash.fastq`) reads, in `outdir`.
pub fn filter_reads(
    finder: &PrimerFinder,
    forward: &Path,
    reverse: &Path,
    outdir: &Path,
    cutoff: bool,
) -> Result<(IndexMap<String, PathBuf>, FilterStats)> {
    let pairs = read_pairs(forward, reverse)?;
    std::fs::create_dir_all(outdir)
        .with_context(|| format!("Unable to create output directory {outdir:?}"))?;

    let mut paths = IndexMap::new();
    let mut writers = Vec::new();
    for (mate, path) in [("R1", forward), ("R2", reverse)] {
        let name = sample_name(path)?;
        for kind in ["16S", "trash"] {
            let out = outdir.join(format!("{name}.{kind}.fastq"));
            writers.push(io::create(&out)?);
            paths.insert(format!("{kind}_{mate}"), out);
        }
    }
    // writers: [16S R1, trash R1, 16S R2, trash R2]

    let results: Vec<Option<ReadPair>> = pairs
        .par_iter()
        .map(|pair| classify(finder, pair, cutoff))
        .collect();

    let mut stats = FilterStats::default();
    let mut progress = Progress::new(pairs.len(), PROGRESS_STEP);
    for (done, (pair, kept)) in pairs.iter().zip(results).enumerate() {
        match kept {
            Some(kept) => {
                write_record(&mut writers[0], &kept.forward)?;
                write_record(&mut writers[2], &kept.reverse)?;
                stats.kept += 1;
            }
            None => {
                write_record(&mut writers[1], &pair.forward)?;
                write_record(&mut writers[3], &pair.reverse)?;
                stats.trashed += 1;
            }
        }
        progress.update(done + 1);
    }

    for w in writers.iter_mut() {
        w.flush()?;
    }

    info!(
        "{} pairs with primer sequences, {} pairs without",
        stats.kept, stats.trashed
    );
    Ok((paths, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primers::Primer;

    fn finder() -> PrimerFinder {
        PrimerFinder::new(vec![Primer {
            id: String::from("341F"),
            seq: b"CCTACGGGAGGCAGCAG".to_vec(),
        }])
    }

    #[test]
    fn strips_fastq_extensions() {
        assert_eq!(sample_name(Path::new("/a/s1_R1_001.fastq.gz")).unwrap(), "s1_R1_001");
        assert_eq!(sample_name(Path::new("x.fq")).unwrap(), "x");
        assert_eq!(sample_name(Path::new("reads.txt")).unwrap(), "reads.txt");
    }

    #[test]
    fn splits_pairs_by_primer() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = dir.path().join("s_R1.fastq");
        let r2 = dir.path().join("s_R2.fastq");
        std::fs::write(
            &r1,
            "@p0\nCCTACGGGAGGCAGCAGTTTT\n+\nIIIIIIIIIIIIIIIIIIIII\n@p1\nTTTTTTTTTTTTTTTTTTTTT\n+\nIIIIIIIIIIIIIIIIIIIII\n",
        )
        .unwrap();
        std::fs::write(
            &r2,
            "@p0\nAAAA\n+\nIIII\n@p1\nAAAA\n+\nIIII\n",
        )
        .unwrap();

        let out = dir.path().join("out");
        let (paths, stats) = filter_reads(&finder(), &r1, &r2, &out, true).unwrap();
        assert_eq!(stats, FilterStats { kept: 1, trashed: 1 });

        assert_eq!(paths["16S_R1"], out.join("s_R1.16S.fastq"));
        let kept = std::fs::read_to_string(&paths["16S_R1"]).unwrap();
        assert_eq!(kept, "@p0\nTTTT\n+\nIIII\n");
        let trash = std::fs::read_to_string(&paths["trash_R2"]).unwrap();
        assert_eq!(trash, "@p1\nAAAA\n+\nIIII\n");
    }
}
