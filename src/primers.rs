use crate::error::InputError;

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;

/// A PCR primer, possibly containing IUPAC ambiguity codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Primer {
    pub id: String,
    pub seq: Vec<u8>,
}

/// Reads primers from a FASTA file.
///
/// # Errors
///
/// Fails if the file cannot be read, contains no primers, or a primer contains a symbol which is
/// not an IUPAC nucleotide code.
pub fn load_primers(path: &Path) -> Result<Vec<Primer>> {
    let invalid = Regex::new("[^ATGCRYSWKMBDHVN]")?;
    let mut reader = needletail::parse_fastx_file(path)
        .with_context(|| format!("Unable to open primer file {path:?}"))?;

    let mut primers = Vec::new();
    while let Some(rec) = reader.next() {
        let rec = rec.with_context(|| format!("Invalid record in primer file {path:?}"))?;
        let id = String::from_utf8_lossy(rec.id()).to_string();
        let seq = String::from_utf8_lossy(&rec.seq()).to_ascii_uppercase();

        let mut symbols: Vec<&str> = invalid.find_iter(&seq).map(|m| m.as_str()).collect();
        if !symbols.is_empty() {
            symbols.sort_unstable();
            symbols.dedup();
            return Err(InputError::InvalidPrimer {
                id,
                symbols: symbols.join(", "),
            }
            .into());
        }

        primers.push(Primer {
            id,
            seq: seq.into_bytes(),
        });
    }

    if primers.is_empty() {
        return Err(InputError::EmptyFasta {
            path: path.to_path_buf(),
        }
        .into());
    }

    for p in &primers {
        info!("Primer {}: {}", p.id, String::from_utf8_lossy(&p.seq));
    }
    Ok(primers)
}

/// Whether a read base is compatible with a primer symbol. An unknown read base matches nothing.
fn iupac_match(base: u8, symbol: u8) -> bool {
    let compatible: &[u8] = match base {
        b'A' => b"ANRWMDHV",
        b'G' => b"GNRSKBDV",
        b'C' => b"CNYSMBHV",
        b'T' => b"TNYWKBDH",
        _ => b"",
    };
    compatible.contains(&symbol)
}

/// Looks for any of a set of primers at the start of a read, allowing the primer to be shifted by
/// a few bases in either direction.
pub struct PrimerFinder {
    primers: Vec<Primer>,
    max_shift: usize,
    min_fraction: f64,
}

impl PrimerFinder {
    pub fn new(primers: Vec<Primer>) -> Self {
        PrimerFinder {
            primers,
            max_shift: 4,
            min_fraction: 0.51,
        }
    }

    /// Returns the number of leading bases taken up by the primer, or `None` without a primer.
    pub fn find(&self, read: &[u8]) -> Option<usize> {
        for primer in &self.primers {
            let p = &primer.seq;
            if p.is_empty() {
                continue;
            }

            for shift in 0..=self.max_shift.min(p.len() - 1) {
                let window = p.len() - shift;

                // primer starts before the read
                let score = (0..window)
                    .filter(|&i| read.get(i).is_some_and(|&b| iupac_match(b, p[i + shift])))
                    .count();
                if self.accept(score, p.len()) {
                    return Some((p.len() - shift).min(read.len()));
                }

                // read starts before the primer
                let score = (0..window)
                    .filter(|&i| read.get(i + shift).is_some_and(|&b| iupac_match(b, p[i])))
                    .count();
                if self.accept(score, p.len()) {
                    return Some((p.len() + shift).min(read.len()));
                }
            }
        }
        None
    }

    fn accept(&self, score: usize, primer_len: usize) -> bool {
        score as f64 / primer_len as f64 >= self.min_fraction
    }
}
