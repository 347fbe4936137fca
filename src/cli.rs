// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;

use crate::export::CnvStyle;
use crate::maf::JoinMode;
use crate::pipeline::{
    self, AggregateConfigBuilder, BootstrapConfigBuilder, PipelineOutcome,
};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "phylostrap",
    about = "Prepare multi-sample tumor mutation calls for phylogenetic inference.",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
pub struct Phylostrap {
    #[structopt(long, short, global = true, help = "Verbose output.")]
    pub verbose: bool,
    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    #[structopt(
        name = "aggregate",
        about = "Join tissue and blood MAF tables, remove germline variants and write the \
                 canonical mutation table.",
        setting = structopt::clap::AppSettings::ColoredHelp
    )]
    Aggregate {
        #[structopt(
            long,
            short = "s",
            parse(from_os_str),
            help = "MAF with solid tissue (ST) variant calls."
        )]
        tissue: PathBuf,
        #[structopt(
            long,
            short = "c",
            parse(from_os_str),
            help = "MAF with cell-free blood (CF) variant calls."
        )]
        blood: PathBuf,
        #[structopt(
            long,
            short = "b",
            parse(from_os_str),
            help = "MAF with germline (BC) variant calls; mutations found here are removed \
                    as inherited."
        )]
        germline: PathBuf,
        #[structopt(
            long,
            short = "m",
            default_value = "intersection",
            help = "How to reconcile tissue and blood calls (intersection or union)."
        )]
        mode: String,
        #[structopt(long, short = "o", parse(from_os_str), help = "Output directory.")]
        output: PathBuf,
        #[structopt(
            long,
            short = "p",
            help = "Also export the unresampled SSM record set for the inference engine."
        )]
        ssm: bool,
        #[structopt(
            long = "cnv-style",
            default_value = "empty",
            help = "Copy-number companion flavor (empty or header-only)."
        )]
        cnv_style: String,
    },
    #[structopt(
        name = "bootstrap",
        about = "Generate bootstrap replicates of a merged mutation table and export one \
                 SSM record set per replicate.",
        setting = structopt::clap::AppSettings::ColoredHelp
    )]
    Bootstrap {
        #[structopt(
            long,
            short = "i",
            parse(from_os_str),
            help = "Merged mutation table (output of the aggregate subcommand)."
        )]
        input: PathBuf,
        #[structopt(long, short = "o", parse(from_os_str), help = "Output directory.")]
        output: PathBuf,
        #[structopt(
            long,
            short = "n",
            default_value = "100",
            help = "Number of bootstrap replicates."
        )]
        num_bootstraps: usize,
        #[structopt(
            long,
            help = "Seed for replicate generation; omit for entropy seeding."
        )]
        seed: Option<u64>,
        #[structopt(
            long,
            short = "p",
            help = "Export per-replicate SSM record sets for the inference engine."
        )]
        ssm: bool,
        #[structopt(
            long = "cnv-style",
            default_value = "empty",
            help = "Copy-number companion flavor (empty or header-only)."
        )]
        cnv_style: String,
    },
}

pub fn run(opt: Phylostrap) -> Result<()> {
    let outcome = match opt.command {
        Command::Aggregate {
            tissue,
            blood,
            germline,
            mode,
            output,
            ssm,
            cnv_style,
        } => {
            let config = AggregateConfigBuilder::default()
                .tissue(tissue)
                .blood(blood)
                .germline(germline)
                .join_mode(JoinMode::parse(&mode)?)
                .output_dir(output)
                .ssm(ssm)
                .cnv_style(CnvStyle::parse(&cnv_style)?)
                .build()?;
            pipeline::run_aggregate(&config)?
        }
        Command::Bootstrap {
            input,
            output,
            num_bootstraps,
            seed,
            ssm,
            cnv_style,
        } => {
            let config = BootstrapConfigBuilder::default()
                .input(input)
                .output_dir(output)
                .num_bootstraps(num_bootstraps)
                .seed(seed)
                .ssm(ssm)
                .cnv_style(CnvStyle::parse(&cnv_style)?)
                .build()?;
            pipeline::run_bootstrap(&config)?
        }
    };

    if let PipelineOutcome::Completed {
        rows,
        skipped,
        forced_sites,
    } = outcome
    {
        debug!(
            "done: {} rows, {} skipped in export, {} forced depth floors",
            rows, skipped, forced_sites
        );
    }

    Ok(())
}
