//! Primer filtering and read merging for 16S paired-end amplicon sequencing.
//!
//! The entry point for merging is [`run::ReadMerger`]: each pair is classified by a
//! [`merge::MergeEngine`], which tries a naive overlap search, a pairwise aligner and finally a
//! reference database, and ends up merged, chimeric or too short.

#[macro_use]
extern crate log;

pub mod align;
pub mod config;
pub mod constant;
pub mod error;
pub mod filter;
pub mod io;
pub mod merge;
pub mod overlap;
pub mod primers;
pub mod record;
pub mod reference;
pub mod run;
pub mod summary;

#[cfg(test)]
mod testing;
