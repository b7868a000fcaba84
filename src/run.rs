use crate::config::MergeConfig;
use crate::error::MergeError;
use crate::io::{self, CategoryWriters};
use crate::merge::{MergeEngine, MergingStats, Stage, StatsAccumulator, Verdict};
use crate::record::ReadPair;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use pariter::IteratorExt as _;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

const fn extra_build_info() -> &'static str {
    match option_env!("CARGO_BUILD_DESC") {
        Some(e) => e,
        None => env!("CARGO_PKG_VERSION"),
    }
}
pub const VERSION: &str = extra_build_info();

/// Name of the JSON report written next to the outputs of a run.
pub const STATS_FILE: &str = "merge_stats.json";

/// Logs a line each time the processed fraction of the input crosses a multiple of `step`.
pub(crate) struct Progress {
    total: usize,
    step: f64,
    reported: usize,
}

impl Progress {
    pub(crate) fn new(total: usize, step: f64) -> Self {
        Progress {
            total,
            step,
            reported: 0,
        }
    }

    /// Returns the fraction reported, if any.
    pub(crate) fn update(&mut self, done: usize) -> Option<f64> {
        if self.total == 0 || self.step.is_nan() || self.step <= 0.0 {
            return None;
        }

        let fraction = done as f64 / self.total as f64;
        let reached = (fraction / self.step + 1e-9).floor() as usize;
        if reached <= self.reported {
            return None;
        }

        self.reported = reached;
        let shown = (reached as f64 * self.step).min(1.0);
        info!(
            "Processed: {done}/{} pairs ({:.0}%)",
            self.total,
            shown * 100.0
        );
        Some(shown)
    }
}

/// The report written to `merge_stats.json`.
#[derive(Serialize)]
struct StatsReport<'a> {
    version: &'a str,
    date: String,
    forward: &'a Path,
    reverse: &'a Path,
    elapsed_secs: f64,
    stages: Vec<Stage>,
    counts: &'a MergingStats,
    config: &'a MergeConfig,
}

/// Owns a merge engine and the statistics of the runs made with it.
pub struct ReadMerger {
    engine: MergeEngine,
    config: MergeConfig,
    stats: StatsAccumulator,
}

impl ReadMerger {
    pub fn new(engine: MergeEngine, config: MergeConfig) -> Self {
        ReadMerger {
            engine,
            config,
            stats: StatsAccumulator::new(),
        }
    }

    /// Merges every pair of `forward` and `reverse`, writing each to the output of its category
    /// inside `outdir`.
    ///
    /// # Arguments
    ///
    /// * `forward`, `reverse` - FASTQ files with the same reads in the same order.
    /// * `outdir` - Output directory, created if missing. Existing outputs are overwritten.
    /// * `progress_step` - Fraction of the input between two progress lines, e.g. `0.05`.
    ///
    /// # Returns
    ///
    /// The path of each output, by name: `merged`, `chimera_R1`, `chimera_R2`, `too_short_R1`,
    /// `too_short_R2`, `tool_failures` and `stats`.
    ///
    /// # Errors
    ///
    /// Malformed input is reported before any output is created. Failures of the external tools
    /// are not errors; they route the affected pairs to the chimera output.
    pub fn merge_reads(
        &mut self,
        forward: &Path,
        reverse: &Path,
        outdir: &Path,
        progress_step: f64,
    ) -> Result<IndexMap<String, PathBuf>> {
        let start = Instant::now();
        let pairs = io::read_pairs(forward, reverse)?;

        std::fs::create_dir_all(outdir)
            .with_context(|| format!("Unable to create output directory {outdir:?}"))?;
        let mut writers = CategoryWriters::create(outdir)?;

        self.stats.start();
        info!(
            "Merging with stages: {}",
            self.engine
                .stages()
                .iter()
                .map(Stage::name)
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        let mut progress = Progress::new(pairs.len(), progress_step);
        let mut done = 0;
        let stats = &mut self.stats;
        let mut collect = |pair: &ReadPair, verdict: Verdict| -> Result<()> {
            writers.write(pair, &verdict)?;
            stats.record(&verdict);
            done += 1;
            progress.update(done);
            Ok(())
        };

        let engine = &self.engine;
        let threads = self.config.threads.max(1);
        if threads == 1 {
            for pair in pairs.iter() {
                collect(pair, engine.classify(pair))?;
            }
        } else {
            let result = crossbeam::thread::scope(|scope| -> Result<()> {
                pairs
                    .iter()
                    .parallel_map_scoped_custom(
                        scope,
                        |o| o.threads(threads).buffer_size(threads * 3),
                        |pair| (pair, engine.classify(pair)),
                    )
                    // single writer, in input order
                    .try_for_each(|(pair, verdict)| collect(pair, verdict))
            });

            result.unwrap_or_else(|e| {
                error!("Caught a panic which is unrecoverable");
                std::panic::resume_unwind(e)
            })?;
        }

        let mut paths = writers.finish()?;
        self.stats.finish();
        let counts = self.stats.get()?;

        let report = StatsReport {
            version: VERSION,
            date: chrono::Local::now().to_rfc3339(),
            forward,
            reverse,
            elapsed_secs: start.elapsed().as_secs_f64(),
            stages: self.engine.stages(),
            counts,
            config: &self.config,
        };
        let stats_path = outdir.join(STATS_FILE);
        let file = std::fs::File::create(&stats_path)
            .with_context(|| format!("Unable to create file {stats_path:?}"))?;
        serde_json::to_writer_pretty(file, &report).context("Could not write statistics")?;
        paths.insert(String::from("stats"), stats_path);

        info!(
            "Merged: {}, chimeras: {} ({} after tool failures), too short: {}",
            counts.merged, counts.chimera, counts.tool_failures, counts.too_short
        );

        Ok(paths)
    }

    /// Counts of the last completed run, by category.
    ///
    /// # Errors
    ///
    /// `MergeError::StatsNotReady` if no run has completed yet.
    pub fn statistics(&self) -> Result<IndexMap<&'static str, usize>, MergeError> {
        self.stats.get().map(MergingStats::as_map)
    }

    pub fn stats(&self) -> Result<&MergingStats, MergeError> {
        self.stats.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::tests::random_seq;
    use crate::record::{encode_qual, reverse_complement};

    /// Writes `n` pairs: even pairs overlap by 60 bases, odd pairs by 5 bases.
    fn write_input(dir: &Path, n: usize) -> (PathBuf, PathBuf) {
        let mut r1 = String::new();
        let mut r2 = String::new();
        let qual = encode_qual(&[35; 150]);

        for i in 0..n {
            let fragment = random_seq(if i % 2 == 0 { 240 } else { 295 }, 100 + i as u64);
            let fwd = &fragment[..150];
            let rev = reverse_complement(&fragment[fragment.len() - 150..]);
            r1 += &format!("@pair{i}\n{}\n+\n{qual}\n", String::from_utf8_lossy(fwd));
            r2 += &format!("@pair{i}\n{}\n+\n{qual}\n", String::from_utf8_lossy(&rev));
        }

        let (p1, p2) = (dir.join("R1.fastq"), dir.join("R2.fastq"));
        std::fs::write(&p1, r1).unwrap();
        std::fs::write(&p2, r2).unwrap();
        (p1, p2)
    }

    fn merger(threads: usize) -> ReadMerger {
        let config = MergeConfig {
            threads,
            ..MergeConfig::default()
        };
        ReadMerger::new(MergeEngine::standard(&config, None, None, None), config)
    }

    #[test]
    fn statistics_before_merging_is_an_error() {
        assert!(matches!(
            merger(1).statistics(),
            Err(MergeError::StatsNotReady)
        ));
    }

    #[test]
    fn every_pair_lands_in_one_category() {
        let dir = tempfile::tempdir().unwrap();
        let (r1, r2) = write_input(dir.path(), 10);
        let out = dir.path().join("out");

        let mut m = merger(1);
        let paths = m.merge_reads(&r1, &r2, &out, 0.05).unwrap();

        let stats = m.statistics().unwrap();
        assert_eq!(stats["merged"], 5);
        assert_eq!(stats["too_short"], 5);
        assert_eq!(stats["merged"] + stats["chimera"] + stats["too_short"], 10);

        let merged = std::fs::read_to_string(&paths["merged"]).unwrap();
        assert_eq!(merged.lines().count(), 5 * 4);
        let too_short = std::fs::read_to_string(&paths["too_short_R2"]).unwrap();
        assert_eq!(too_short.lines().count(), 5 * 4);

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths["stats"]).unwrap()).unwrap();
        assert_eq!(report["counts"]["merged"], 5);
        assert_eq!(report["stages"][0], "naive");
    }

    #[test]
    fn runs_are_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let (r1, r2) = write_input(dir.path(), 12);

        let mut m = merger(1);
        let first = m.merge_reads(&r1, &r2, &dir.path().join("a"), 0.1).unwrap();
        let first_stats = *m.stats().unwrap();

        let second = m.merge_reads(&r1, &r2, &dir.path().join("b"), 0.1).unwrap();
        assert_eq!(*m.stats().unwrap(), first_stats);
        assert_eq!(
            std::fs::read_to_string(&first["merged"]).unwrap(),
            std::fs::read_to_string(&second["merged"]).unwrap()
        );
    }

    #[test]
    fn parallel_runs_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let (r1, r2) = write_input(dir.path(), 40);

        let mut serial = merger(1);
        let a = serial.merge_reads(&r1, &r2, &dir.path().join("a"), 0.5).unwrap();
        let mut parallel = merger(4);
        let b = parallel.merge_reads(&r1, &r2, &dir.path().join("b"), 0.5).unwrap();

        for name in ["merged", "too_short_R1", "too_short_R2"] {
            assert_eq!(
                std::fs::read_to_string(&a[name]).unwrap(),
                std::fs::read_to_string(&b[name]).unwrap()
            );
        }
        assert_eq!(serial.stats().unwrap(), parallel.stats().unwrap());
    }

    #[test]
    fn malformed_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (r1, _) = write_input(dir.path(), 2);
        let short = dir.path().join("short.fastq");
        std::fs::write(&short, "").unwrap();
        let out = dir.path().join("out");

        let mut m = merger(1);
        assert!(m.merge_reads(&r1, &short, &out, 0.05).is_err());
        assert!(!out.exists());
        assert!(m.statistics().is_err());
    }

    #[test]
    fn progress_reports_each_step_once() {
        let mut p = Progress::new(20, 0.25);
        let reported: Vec<f64> = (1..=20).filter_map(|done| p.update(done)).collect();
        assert_eq!(reported, vec![0.25, 0.5, 0.75, 1.0]);

        assert_eq!(Progress::new(0, 0.05).update(0), None);
        assert_eq!(Progress::new(10, 0.0).update(10), None);
        assert_eq!(Progress::new(10, f64::NAN).update(10), None);
    }
}
