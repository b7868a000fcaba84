extern crate env_logger;
#[macro_use]
extern crate log;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

use pairmerge::config::{DetectorParams, MergeConfig, ReferenceParams};
use pairmerge::constant::ConstantRegionValidator;
use pairmerge::merge::MergeEngine;
use pairmerge::primers::{load_primers, PrimerFinder};
use pairmerge::reference::{BlastDatabase, ReferenceSearch};
use pairmerge::run::ReadMerger;
use pairmerge::{filter, summary};

mod cli;
mod preset;

use cli::{Cli, Commands};

fn try_main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let cli = Cli::parse();

    info!("pairmerge v{}", cli::VERSION);

    match cli.command {
        Commands::Merge {
            forward,
            reverse,
            outdir,
            db,
            constant_region,
            aligner,
            on_tool_failure,
            retries,
            timeout,
            min_overlap,
            min_identity,
            max_gap,
            progress_step,
            threads,
        } => {
            let timeout = Duration::try_from_secs_f64(timeout)
                .with_context(|| format!("Invalid timeout of {timeout} seconds"))?;

            let config = MergeConfig {
                detector: DetectorParams {
                    min_identity,
                    ..DetectorParams::default()
                },
                reference: ReferenceParams {
                    max_gap,
                    ..ReferenceParams::default()
                },
                min_overlap,
                failure_policy: preset::get_failure_policy(on_tool_failure, retries),
                timeout,
                threads,
                ..MergeConfig::default()
            };

            let constant = match constant_region {
                Some(path) => Some(ConstantRegionValidator::from_fasta(
                    &path,
                    config.constant.clone(),
                )?),
                None => None,
            };

            let db = db.map(|path| {
                info!("Using reference database {path:?}");
                Box::new(BlastDatabase::new(path, timeout)) as Box<dyn ReferenceSearch>
            });

            let engine = MergeEngine::standard(
                &config,
                preset::get_aligner(aligner, timeout),
                db,
                constant,
            );

            let mut merger = ReadMerger::new(engine, config);
            let outputs = merger.merge_reads(&forward, &reverse, &outdir, progress_step)?;

            for (name, path) in &outputs {
                info!("{name}: {path:?}");
            }
            info!("Completed successfully.")
        }
        Commands::Filter {
            primers,
            forward,
            reverse,
            outdir,
            cutoff,
        } => {
            let finder = PrimerFinder::new(load_primers(&primers)?);
            filter::filter_reads(&finder, &forward, &reverse, &outdir, cutoff)?;

            info!("Completed successfully.")
        }
        Commands::Summary { stats, output } => {
            summary::summarize(&stats, &output)?;
            info!("Wrote summary to {output:?}");
        }
    };
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        error!("{}", err);

        // report any errors that are produced
        err.chain()
            .skip(1)
            .for_each(|cause| error!("  because: {}", cause));

        std::process::exit(1);
    }
}
