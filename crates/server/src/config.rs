#![forbid(unsafe_code)]

use clap::Parser;
use la_engine::EngineConfig;
use std::path::PathBuf;

const DEFAULT_STORAGE_DIR: &str = ".listarchive";
const DEFAULT_LOG_FILTER: &str = "info";

/// Mailing-list archive engine speaking newline-delimited JSON on stdio.
///
/// Requests are read from stdin, events are written to stdout and logs go to
/// stderr. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(name = "listarchive", version, about)]
pub struct Cli {
    /// Directory holding the archive database [env: LISTARCHIVE_HOME] [default: ./.listarchive]
    #[arg(long, short = 'd')]
    pub storage_dir: Option<PathBuf>,

    /// Messages per write job [default: 500]
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Log filter directives, e.g. `la_engine=debug` [env: LISTARCHIVE_LOG] [default: info]
    #[arg(long)]
    pub log: Option<String>,
}

#[derive(Debug)]
pub struct Config {
    pub storage_dir: PathBuf,
    pub chunk_size: Option<usize>,
    pub log_filter: String,
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Self {
        let storage_dir = cli
            .storage_dir
            .or_else(|| std::env::var("LISTARCHIVE_HOME").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));

        let log_filter = cli
            .log
            .or_else(|| std::env::var("LISTARCHIVE_LOG").ok())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Self {
            storage_dir,
            chunk_size: cli.chunk_size,
            log_filter,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        let config = EngineConfig::new(&self.storage_dir);
        match self.chunk_size {
            Some(size) => config.with_chunk_size(size),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_values_win() {
        let cli = Cli::parse_from([
            "listarchive",
            "--storage-dir",
            "/tmp/archive",
            "--chunk-size",
            "64",
            "--log",
            "warn",
        ]);
        let config = Config::from_cli_and_env(cli);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/archive"));
        assert_eq!(config.log_filter, "warn");

        let engine = config.engine_config();
        assert_eq!(engine.chunk_size, 64);
        assert_eq!(engine.storage_dir, PathBuf::from("/tmp/archive"));
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let cli = Cli::parse_from(["listarchive", "--storage-dir", "x", "--chunk-size", "0"]);
        assert_eq!(Config::from_cli_and_env(cli).engine_config().chunk_size, 1);
    }
}
