#![forbid(unsafe_code)]

mod config;
mod stdio;

use clap::Parser;
use config::{Cli, Config};
use la_engine::{Engine, Event};
use std::sync::Arc;
use std::sync::mpsc;

fn main() {
    let config = Config::from_cli_and_env(Cli::parse());
    init_logging(&config.log_filter);

    if let Err(err) = run(&config) {
        tracing::error!(error = %err, "listarchive stopped");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let (events, receiver) = mpsc::channel::<Event>();
    let writer = stdio::spawn_event_writer(receiver)?;

    let engine = Engine::new(config.engine_config(), Arc::new(events));
    if let Err(err) = engine.initialize() {
        // Keep serving: every request will be answered with this error.
        tracing::error!(
            error = %err,
            storage_dir = %engine.config().storage_dir.display(),
            "archive unavailable"
        );
    }

    let stdin = std::io::stdin();
    let served = stdio::serve(&engine, stdin.lock());

    // Queued writes and their events are flushed even when stdin failed.
    engine.shutdown();
    drop(engine);
    if writer.join().is_err() {
        tracing::error!("event writer terminated abnormally");
    }
    Ok(served?)
}

fn init_logging(directives: &str) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;

    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr),
    );

    let _ = tracing::dispatcher::set_global_default(tracing::Dispatch::new(subscriber));
}
