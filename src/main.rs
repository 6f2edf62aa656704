use anyhow::Result;
use log::error;
use std::process;

use imgsweep::{app, cli, logging};

fn main() {
    // Task panics are contained by the runner; only record them here
    std::panic::set_hook(Box::new(|panic_info| {
        if log::log_enabled!(log::Level::Error) {
            error!("Panic: {}", panic_info);
        } else {
            eprintln!("Panic: {}", panic_info);
        }
    }));

    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::args::parse_args();
    cli::args::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;

    let log_config = app::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;

    let batch_config = app::build_batch_config(&args, &config_manager)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("imgsweep-worker")
        .build()?;

    runtime.block_on(app::run_batch(batch_config))?;
    Ok(())
}
