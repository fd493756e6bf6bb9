// src/main.rs

use anyhow::Context;
use watchcron::{cli, logging, run};

fn main() {
    let args = cli::parse();
    if let Err(err) = run_main(args) {
        eprintln!("watchcrond error: {err:?}");
        std::process::exit(1);
    }
}

fn run_main(args: cli::CliArgs) -> anyhow::Result<()> {
    logging::init_logging(args.log_level)?;

    // Daemonize before the runtime exists; fork() and threads don't mix.
    if !args.foreground {
        nix::unistd::daemon(false, false).context("daemonizing")?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(run(args))
}
