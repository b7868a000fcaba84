use crate::error::InputError;
use crate::merge::{ChimeraReason, MergedRead, Verdict};
use crate::record::{ReadPair, SequenceRecord};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Reads every record of a FASTQ file (optionally gzipped).
///
/// # Errors
///
/// This function will return an error if:
/// * The file cannot be opened.
/// * A record cannot be parsed, or has no quality scores.
/// * A record contains a base other than `ACGTN`, or its quality string has the wrong length.
pub fn read_records(path: &Path) -> Result<Vec<SequenceRecord>> {
    // needletail refuses empty input, but an empty file simply has no reads
    if std::fs::metadata(path)
        .with_context(|| format!("Unable to open file {path:?}"))?
        .len()
        == 0
    {
        return Ok(Vec::new());
    }

    let mut reader = needletail::parse_fastx_file(path)
        .with_context(|| format!("Unable to open file {path:?}"))?;

    let mut records = Vec::new();
    while let Some(rec) = reader.next() {
        let index = records.len();
        let rec = rec.map_err(|e| InputError::CorruptRecord {
            path: path.to_path_buf(),
            index,
            reason: e.to_string(),
        })?;

        let rec = SequenceRecord::try_from(rec).map_err(|e| InputError::CorruptRecord {
            path: path.to_path_buf(),
            index,
            reason: e.to_string(),
        })?;
        records.push(rec);
    }

    Ok(records)
}

/// Loads both read files and pairs them up by position. The whole input is validated here, so
/// that malformed input never leaves partial output behind.
pub fn read_pairs(forward: &Path, reverse: &Path) -> Result<Vec<ReadPair>> {
    let fwd = read_records(forward)?;
    let rev = read_records(reverse)?;

    if fwd.len() != rev.len() {
        return Err(InputError::UnequalPairCounts {
            forward_path: forward.to_path_buf(),
            reverse_path: reverse.to_path_buf(),
            forward: fwd.len(),
            reverse: rev.len(),
        }
        .into());
    }

    info!("Loaded {} read pairs", fwd.len());

    Ok(fwd
        .into_iter()
        .zip(rev)
        .enumerate()
        .map(|(index, (forward, reverse))| ReadPair {
            index,
            forward,
            reverse,
        })
        .collect())
}

/// Formats a single FASTQ entry. `qual` must already be Phred+33 encoded.
pub fn write_fastq(
    writer: &mut impl Write,
    id: &str,
    seq: &[u8],
    qual: &str,
) -> std::io::Result<()> {
    writeln!(writer, "@{id}")?;
    writer.write_all(seq)?;
    writeln!(writer, "\n+\n{qual}")
}

pub fn write_record(writer: &mut impl Write, rec: &SequenceRecord) -> std::io::Result<()> {
    write_fastq(writer, rec.id(), rec.seq(), &rec.encoded_qual())
}

pub fn write_merged(writer: &mut impl Write, read: &MergedRead) -> std::io::Result<()> {
    write_fastq(writer, &read.id, &read.seq, &read.encoded_qual())
}

pub fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Unable to create file {path:?}"))?;
    Ok(BufWriter::new(file))
}

#[derive(Serialize)]
struct ToolFailureRow<'a> {
    pair: usize,
    read_id: &'a str,
    stage: &'a str,
    error: String,
}

/// The output streams of a merging run, one per category and mate, plus the record of pairs
/// which were routed to the chimeras because of a tool failure.
pub struct CategoryWriters {
    merged: BufWriter<File>,
    chimera: [BufWriter<File>; 2],
    too_short: [BufWriter<File>; 2],
    tool_failures: csv::Writer<File>,
    paths: IndexMap<String, PathBuf>,
}

impl CategoryWriters {
    /// Creates (or truncates) every output file inside `outdir`.
    pub fn create(outdir: &Path) -> Result<Self> {
        let mut paths = IndexMap::new();
        let mut open = |name: &str, ext: &str| -> Result<BufWriter<File>> {
            let path = outdir.join(format!("{name}.{ext}"));
            let writer = create(&path)?;
            paths.insert(name.to_string(), path);
            Ok(writer)
        };

        let merged = open("merged", "fastq")?;
        let chimera = [open("chimera_R1", "fastq")?, open("chimera_R2", "fastq")?];
        let too_short = [open("too_short_R1", "fastq")?, open("too_short_R2", "fastq")?];

        let failures_path = outdir.join("tool_failures.tsv");
        let tool_failures = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(&failures_path)
            .with_context(|| format!("Unable to create file {failures_path:?}"))?;
        paths.insert(String::from("tool_failures"), failures_path);

        Ok(CategoryWriters {
            merged,
            chimera,
            too_short,
            tool_failures,
            paths,
        })
    }

    /// Writes a classified pair to the stream of its category.
    pub fn write(&mut self, pair: &ReadPair, verdict: &Verdict) -> Result<()> {
        match verdict {
            Verdict::Merged { read, .. } => write_merged(&mut self.merged, read)?,
            Verdict::TooShort { .. } => {
                write_record(&mut self.too_short[0], &pair.forward)?;
                write_record(&mut self.too_short[1], &pair.reverse)?;
            }
            Verdict::Chimera(reason) => {
                write_record(&mut self.chimera[0], &pair.forward)?;
                write_record(&mut self.chimera[1], &pair.reverse)?;

                if let ChimeraReason::ToolFailure { stage, error } = reason {
                    self.tool_failures.serialize(ToolFailureRow {
                        pair: pair.index,
                        read_id: pair.forward.id(),
                        stage: stage.name(),
                        error: error.replace('\n', " "),
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Flushes every stream, and returns the output path of each.
    pub fn finish(mut self) -> Result<IndexMap<String, PathBuf>> {
        self.merged.flush()?;
        for w in self.chimera.iter_mut().chain(self.too_short.iter_mut()) {
            w.flush()?;
        }
        self.tool_failures.flush()?;
        Ok(self.paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::Stage;
    use crate::overlap::tests::record;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_pairs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = write_file(dir.path(), "r1.fq", "@a\nACGT\n+\nIIII\n@b\nacgn\n+\n!!!!\n");
        let r2 = write_file(dir.path(), "r2.fq", "@a\nTTTT\n+\nIIII\n@b\nGGGG\n+\n####\n");

        let pairs = read_pairs(&r1, &r2).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].index, 1);
        assert_eq!(pairs[1].forward.seq(), b"ACGN");
        assert_eq!(pairs[1].forward.qual(), &[0, 0, 0, 0]);
        assert_eq!(pairs[1].reverse.qual(), &[2, 2, 2, 2]);
        assert_eq!(pairs[0].forward.qual(), &[40, 40, 40, 40]);
    }

    #[test]
    fn unequal_counts_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = write_file(dir.path(), "r1.fq", "@a\nACGT\n+\nIIII\n@b\nACGT\n+\nIIII\n");
        let r2 = write_file(dir.path(), "r2.fq", "@a\nTTTT\n+\nIIII\n");

        let err = read_pairs(&r1, &r2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::UnequalPairCounts {
                forward: 2,
                reverse: 1,
                ..
            })
        ));
    }

    #[test]
    fn invalid_bases_are_corrupt_records() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = write_file(dir.path(), "r1.fq", "@a\nACGT\n+\nIIII\n@b\nACXT\n+\nIIII\n");

        let err = read_records(&r1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::CorruptRecord { index: 1, .. })
        ));
    }

    #[test]
    fn empty_files_have_no_reads() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = write_file(dir.path(), "r1.fq", "");
        assert!(read_records(&r1).unwrap().is_empty());
    }

    #[test]
    fn formats_fastq() {
        let mut out = Vec::new();
        write_record(&mut out, &record("r1 extra", b"ACGT", 30)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "@r1 extra\nACGT\n+\n????\n");
    }

    #[test]
    fn writes_each_category_to_its_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writers = CategoryWriters::create(dir.path()).unwrap();

        let pair = ReadPair {
            index: 7,
            forward: record("f", b"ACGT", 30),
            reverse: record("r", b"TTTT", 30),
        };
        writers.write(&pair, &Verdict::TooShort { stage: Stage::Naive }).unwrap();
        writers
            .write(
                &pair,
                &Verdict::Chimera(ChimeraReason::ToolFailure {
                    stage: Stage::Aligner,
                    error: String::from("fasta36\ncrashed"),
                }),
            )
            .unwrap();
        let paths = writers.finish().unwrap();

        assert_eq!(paths.keys().collect::<Vec<_>>(), vec![
            "merged",
            "chimera_R1",
            "chimera_R2",
            "too_short_R1",
            "too_short_R2",
            "tool_failures"
        ]);

        let too_short = std::fs::read_to_string(&paths["too_short_R2"]).unwrap();
        assert_eq!(too_short, "@r\nTTTT\n+\n????\n");
        assert!(std::fs::read_to_string(&paths["merged"]).unwrap().is_empty());

        let failures = std::fs::read_to_string(&paths["tool_failures"]).unwrap();
        assert_eq!(
            failures,
            "pair\tread_id\tstage\terror\n7\tf\taligner\tfasta36 crashed\n"
        );
    }
}
