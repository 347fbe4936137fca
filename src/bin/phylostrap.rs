use anyhow::Result;
use structopt::StructOpt;

use phylostrap::cli::{self, Phylostrap};

pub fn main() -> Result<()> {
    let opt = Phylostrap::from_args();

    fern::Dispatch::new()
        .format(|out, message, _| out.finish(format_args!("{}", message)))
        .level(if opt.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .chain(std::io::stderr())
        .apply()?;

    cli::run(opt)
}
