use crate::preset::{AlignerBackend, OnToolFailure};

use clap::builder::styling::AnsiColor;
use clap::builder::Styles;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use pairmerge::run::VERSION;

const INFO_STRING: &str = "
🧬 pairmerge version ";
const AFTER_STRING: &str = "
   ──────────────────────────────────
   primer filtering and read merging for 16S paired-end amplicons";

// colouring of the help
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().bold())
    .usage(AnsiColor::BrightMagenta.on_default().bold())
    .literal(AnsiColor::BrightMagenta.on_default())
    .placeholder(AnsiColor::White.on_default());

#[derive(Parser)]
#[command(
    version = VERSION,
    about = format!("{}{}{}", INFO_STRING, VERSION, AFTER_STRING),
    arg_required_else_help = true,
    flatten_help = true,
    styles = STYLES
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge forward and reverse reads into single reads, sorting pairs into merged, chimeric
    /// and too short
    #[command(arg_required_else_help = true)]
    Merge {
        /// the forward reads (.fastq or .fastq.gz)
        #[arg(short = '1', long = "R1")]
        forward: PathBuf,

        /// the reverse reads, in the same order as the forward reads
        #[arg(short = '2', long = "R2")]
        reverse: PathBuf,

        /// output directory
        #[arg(short, long, default_value = "merged")]
        outdir: PathBuf,

        /// BLAST nucleotide database used to place pairs which do not overlap. without it, the
        /// reference stage is skipped
        #[arg(long)]
        db: Option<PathBuf>,

        /// FASTA file with the constant region expected between the two variable regions.
        /// merged reads without it are reported as chimeras
        #[arg(long)]
        constant_region: Option<PathBuf>,

        /// pairwise aligner for the aligner and reference stages
        #[arg(long, value_enum, default_value = "fasta36")]
        aligner: AlignerBackend,

        /// what to do with a pair when an external tool fails on it
        #[arg(long, value_enum, default_value = "retry")]
        on_tool_failure: OnToolFailure,

        /// how many times a failing tool is retried with `--on-tool-failure retry`
        #[arg(long, default_value_t = 2)]
        retries: usize,

        /// time limit for one run of an external tool, in seconds
        #[arg(long, default_value_t = 60.0)]
        timeout: f64,

        /// overlaps shorter than this are primer artifacts, and the pair is too short
        #[arg(long, default_value_t = 11)]
        min_overlap: usize,

        /// minimum fraction of matching bases in the naive overlap search
        #[arg(long, value_parser = parse_fraction, default_value_t = 0.9)]
        min_identity: f64,

        /// longest gap between the reads which is filled from the reference
        #[arg(long, default_value_t = 90)]
        max_gap: usize,

        /// report progress every time this fraction of the pairs is processed
        #[arg(long, value_parser = parse_fraction, default_value_t = 0.05)]
        progress_step: f64,

        /// the number of threads to use
        #[arg(short, long, default_value_t = 1)]
        threads: usize,
    },

    /// Separate pairs carrying an amplicon primer from cross-talk
    #[command(arg_required_else_help = true)]
    Filter {
        /// FASTA file with the primer sequences (IUPAC codes allowed)
        #[arg(short, long)]
        primers: PathBuf,

        /// the forward reads
        #[arg(short = '1', long = "R1")]
        forward: PathBuf,

        /// the reverse reads
        #[arg(short = '2', long = "R2")]
        reverse: PathBuf,

        /// output directory
        #[arg(short, long, default_value = "filtered")]
        outdir: PathBuf,

        /// remove the primers from the reads which carry them
        #[arg(short, long, action)]
        cutoff: bool,
    },

    /// Generate an HTML summary of a merging run
    #[command(arg_required_else_help = true)]
    Summary {
        /// the merge_stats.json written by `merge`
        #[arg(long)]
        stats: PathBuf,

        /// output file
        #[arg(short, default_value = "summary.html")]
        output: PathBuf,
    },
}

/// Parses a fraction within [0, 1].
fn parse_fraction(arg: &str) -> Result<f64, String> {
    match arg.trim().parse::<f64>() {
        Ok(v) if (0.0..=1.0).contains(&v) => Ok(v),
        _ => Err(indoc::formatdoc! {"
            Expected a fraction between 0 and 1, got '{arg}'. For example:
              --min-identity 0.9
              --progress-step 0.05
            "}),
    }
}
