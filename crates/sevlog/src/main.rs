use clap::Parser;

use sevlog::cli::{Cli, run};
use sevlog::config::{EngineConfig, StorageBackend};
use sevlog::log::EventLog;
use sevlog_logging::SevlogSubscriberBuilder;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => {
            let mut config = EngineConfig::default();
            // Keep diagnostics out of the way of command output
            config.logging.default_level = "warn".to_string();
            config
        }
    };
    if let Some(db) = cli.db {
        config.storage.backend = StorageBackend::Redb;
        config.storage.path = db;
    }
    if let Some(level) = cli.log_level {
        config.logging.default_level = level;
    }

    let _guard = SevlogSubscriberBuilder::new()
        .with_config(config.logging.clone())
        .init();

    let log = EventLog::open(&config)?;
    let stdout = std::io::stdout();
    run(&log, cli.command, &mut stdout.lock())
}
