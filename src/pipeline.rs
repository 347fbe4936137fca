// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Driver wiring: aggregation of the per-sample MAF inputs, replicate
//! generation and export of the per-replicate artifacts.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::bootstrap::BootstrapTable;
use crate::export::{self, CnvStyle};
use crate::maf::{aggregate, JoinMode, MutationTable};
use crate::utils;

pub static MERGED_TABLE_FILE: &str = "aggregated_maf.csv";
pub static BOOTSTRAP_TABLE_FILE: &str = "bootstrapped_maf.csv";
/// Marker written instead of the normal artifacts when aggregation retains
/// no mutations. Downstream stages key off its presence.
pub static SENTINEL_FILE: &str = "empty.txt";

/// Outcome of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// No mutations were retained; the sentinel artifact was written and
    /// nothing else.
    Empty,
    Completed {
        rows: usize,
        /// Rows excluded from the original record set for lack of a usable
        /// observation.
        skipped: usize,
        /// Zero-depth cells forced to one read during resampling.
        forced_sites: usize,
    },
}

/// Configuration of the aggregation stage.
#[derive(Builder, Debug, Clone)]
pub struct AggregateConfig {
    /// MAF with solid tissue (ST) variant calls.
    tissue: PathBuf,
    /// MAF with cell-free blood (CF) variant calls.
    blood: PathBuf,
    /// MAF with germline (BC) variant calls.
    germline: PathBuf,
    #[builder(default = "JoinMode::Intersection")]
    join_mode: JoinMode,
    output_dir: PathBuf,
    /// Also export the unresampled SSM record set.
    #[builder(default)]
    ssm: bool,
    #[builder(default = "CnvStyle::Empty")]
    cnv_style: CnvStyle,
}

/// Configuration of the bootstrap stage.
#[derive(Builder, Debug, Clone)]
pub struct BootstrapConfig {
    /// Merged mutation table (output of the aggregation stage).
    input: PathBuf,
    output_dir: PathBuf,
    #[builder(default = "100")]
    num_bootstraps: usize,
    /// Seed for replicate generation; entropy-seeded when absent.
    #[builder(default)]
    seed: Option<u64>,
    /// Export per-replicate SSM record sets for the inference engine.
    #[builder(default = "true")]
    ssm: bool,
    #[builder(default = "CnvStyle::Empty")]
    cnv_style: CnvStyle,
}

/// Join the three MAF inputs into the canonical mutation table and write it
/// (plus, optionally, the unresampled SSM artifacts).
pub fn run_aggregate(config: &AggregateConfig) -> Result<PipelineOutcome> {
    let table = aggregate::aggregate_from_files(
        &config.blood,
        &config.tissue,
        &config.germline,
        config.join_mode,
    )?;
    if table.is_empty() {
        return write_sentinel(&config.output_dir);
    }

    let rows = table.len();
    let table = BootstrapTable::original_only(table);
    table.write_csv(&config.output_dir.join(MERGED_TABLE_FILE))?;
    info!("retained {} somatic mutations", rows);

    let mut skipped = 0;
    if config.ssm {
        let stats = export::write_ssm(
            &table,
            None,
            &config.output_dir.join(export::ssm_filename(None)),
        )?;
        export::write_cnv(
            &config.output_dir.join(export::cnv_filename(None)),
            config.cnv_style,
        )?;
        skipped = stats.skipped();
    }

    Ok(PipelineOutcome::Completed {
        rows,
        skipped,
        forced_sites: 0,
    })
}

/// Generate bootstrap replicates of a merged mutation table and export one
/// record set per replicate, each in its own directory.
pub fn run_bootstrap(config: &BootstrapConfig) -> Result<PipelineOutcome> {
    let table = MutationTable::from_merged_csv(&config.input)?;
    if table.is_empty() {
        return write_sentinel(&config.output_dir);
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    info!(
        "drawing {} bootstrap replicates over {} mutations",
        config.num_bootstraps,
        table.len()
    );
    let table = BootstrapTable::generate(table, config.num_bootstraps, &mut rng)?;
    let forced_sites = table.forced_sites();

    table.write_csv(&config.output_dir.join(BOOTSTRAP_TABLE_FILE))?;

    let mut skipped = 0;
    if config.ssm {
        let stats = export::write_ssm(
            &table,
            None,
            &config.output_dir.join(export::ssm_filename(None)),
        )?;
        export::write_cnv(
            &config.output_dir.join(export::cnv_filename(None)),
            config.cnv_style,
        )?;
        skipped = stats.skipped();

        // replicate artifacts live in disjoint directories, so exports can
        // run in parallel
        (1..=config.num_bootstraps)
            .into_par_iter()
            .map(|replicate| {
                let dir = config.output_dir.join(format!("bootstrap{}", replicate));
                export::write_ssm(
                    &table,
                    Some(replicate),
                    &dir.join(export::ssm_filename(Some(replicate))),
                )?;
                export::write_cnv(
                    &dir.join(export::cnv_filename(Some(replicate))),
                    config.cnv_style,
                )?;
                Ok(())
            })
            .collect::<Result<Vec<()>>>()?;
        info!(
            "wrote {} replicate record sets to {}",
            config.num_bootstraps,
            config.output_dir.display()
        );
    }

    Ok(PipelineOutcome::Completed {
        rows: table.table().len(),
        skipped,
        forced_sites,
    })
}

fn write_sentinel(dir: &Path) -> Result<PipelineOutcome> {
    warn!("no mutations retained, writing {}", SENTINEL_FILE);
    utils::write_atomic(&dir.join(SENTINEL_FILE), |file| {
        writeln!(file, "No mutations found for this patient.")?;
        Ok(())
    })?;

    Ok(PipelineOutcome::Empty)
}
