use clap::{CommandFactory, FromArgMatches};

use cloudpool::common::cli::RootOptions;
use cloudpool::common::config::Config;
use cloudpool::common::setup::setup_logging;
use cloudpool::run::{Backends, distribute_runs};

async fn command_run(opts: RootOptions) -> anyhow::Result<()> {
    let config = match &opts.common.config {
        Some(path) => Config::load(path)?,
        None => Config::parse("")?,
    };
    let kind = opts.kind.kind();
    let backends = Backends::from_config(&config)?;

    let report = distribute_runs(&config, kind, opts.max_runs, opts.teardown, backends).await?;
    if !report.is_success() {
        log::warn!(
            "{} of {} {kind} task(s) did not succeed",
            report.nonzero_exits.len() + report.failures.len(),
            report.completed()
        );
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> cloudpool::Result<()> {
    let matches = RootOptions::command().get_matches();
    let opts = match RootOptions::from_arg_matches(&matches) {
        Ok(opts) => opts,
        Err(error) => error.exit(),
    };

    setup_logging(opts.common.debug);

    if let Err(error) = command_run(opts).await {
        log::error!("{error:?}");
        std::process::exit(1);
    }

    Ok(())
}
