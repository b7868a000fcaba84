//! Parsing of BLAST-style tabular alignment reports (`fasta36 -m 8`, `blastn -outfmt 6`).

use crate::error::ToolError;
use csv::{ReaderBuilder, StringRecord};
use std::cmp::Ordering;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strand {
    Plus,
    Minus,
}

/// One local alignment between a query and a subject. Coordinates are 1-based and inclusive,
/// as reported by the tools. On the minus strand `s_start > s_end`.
#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub query_id: String,
    pub subject_id: String,
    /// Percent identity.
    pub identity: f64,
    pub length: usize,
    pub mismatches: usize,
    pub gap_opens: usize,
    pub q_start: usize,
    pub q_end: usize,
    pub s_start: usize,
    pub s_end: usize,
    pub evalue: Option<f64>,
    pub bitscore: f64,
    /// Subject accession, which can be used to fetch the subject from a database.
    pub subject_acc: Option<String>,
    pub strand: Strand,
}

impl Hit {
    /// Parses one row. The first twelve columns are the standard tabular columns; `sacc` and
    /// `sstrand` may follow, as requested from `blastn`.
    fn from_record(tool: &str, row: &StringRecord) -> Result<Self, ToolError> {
        if row.len() < 12 {
            return Err(ToolError::malformed(
                tool,
                format!("expected at least 12 columns, got {}: {:?}", row.len(), row),
            ));
        }

        let s_start = parse_col(tool, row, 8)?;
        let s_end = parse_col(tool, row, 9)?;

        let strand = match row.get(13).map(str::trim) {
            Some("minus") => Strand::Minus,
            Some("plus") => Strand::Plus,
            Some(other) if !other.is_empty() && other != "N/A" => {
                return Err(ToolError::malformed(tool, format!("unknown strand `{other}`")))
            }
            _ if s_start > s_end => Strand::Minus,
            _ => Strand::Plus,
        };

        Ok(Hit {
            query_id: row[0].to_string(),
            subject_id: row[1].to_string(),
            identity: parse_col(tool, row, 2)?,
            length: parse_col(tool, row, 3)?,
            mismatches: parse_col(tool, row, 4)?,
            gap_opens: parse_col(tool, row, 5)?,
            q_start: parse_col(tool, row, 6)?,
            q_end: parse_col(tool, row, 7)?,
            s_start,
            s_end,
            evalue: Some(parse_col(tool, row, 10)?),
            bitscore: parse_col(tool, row, 11)?,
            subject_acc: row.get(12).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            strand,
        })
    }

    /// Leftmost aligned subject position (1-based), whatever the strand.
    pub fn s_min(&self) -> usize {
        self.s_start.min(self.s_end)
    }

    pub fn s_max(&self) -> usize {
        self.s_start.max(self.s_end)
    }

    /// Ordering of hits by quality: higher bit score first, then lower e-value, then longer
    /// alignment.
    pub fn rank(a: &Hit, b: &Hit) -> Ordering {
        b.bitscore
            .total_cmp(&a.bitscore)
            .then_with(|| {
                let ea = a.evalue.unwrap_or(f64::INFINITY);
                let eb = b.evalue.unwrap_or(f64::INFINITY);
                ea.total_cmp(&eb)
            })
            .then_with(|| b.length.cmp(&a.length))
    }
}

fn parse_col<T: std::str::FromStr>(
    tool: &str,
    row: &StringRecord,
    idx: usize,
) -> Result<T, ToolError> {
    let field = row[idx].trim();
    field.parse::<T>().map_err(|_| {
        ToolError::malformed(tool, format!("column {} is not a number: `{field}`", idx + 1))
    })
}

/// Parses a tabular report into hits, best first. An empty report means "no hits" and is not
/// an error.
pub fn parse_tabular(tool: &str, report: &str) -> Result<Vec<Hit>, ToolError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(report.as_bytes());

    let mut hits = rdr
        .records()
        .map(|row| {
            let row = row.map_err(|e| ToolError::malformed(tool, e.to_string()))?;
            Hit::from_record(tool, &row)
        })
        .collect::<Result<Vec<_>, _>>()?;

    hits.sort_by(Hit::rank);
    Ok(hits)
}
