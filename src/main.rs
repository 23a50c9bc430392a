use anyhow::Result;
use clap::Parser;
use dmarcwatch::{cli, logging, workflow};

fn main() -> Result<()> {
    let cli_args = cli::Cli::parse();
    logging::init_logging(cli_args.verbose);

    // Delegate the main application logic to the workflow module
    workflow::run_dmarcwatch(cli_args)
}
