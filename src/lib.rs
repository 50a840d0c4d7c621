mod cli;
mod console;
pub mod db;
pub mod history;
pub mod models;
pub mod services;
pub mod settings;
pub mod timer;
mod utils;

use std::time::Duration;

use clap::Parser;
use log::error;

pub use db::Database;
pub use history::HistoryStore;
pub use timer::{TimerController, TimerEvent, TimerSnapshot};

/// Blocking readers (stdin, an open prompt) never finish on their own.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

pub fn run() {
    // Reads RUST_LOG, info by default
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = cli::Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start the async runtime: {err}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(console::dispatch(cli));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    if let Err(err) = result {
        error!("{err:#}");
        std::process::exit(1);
    }
}
