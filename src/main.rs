//! nsq-front daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   client ──TCP──▶ net::listener ──▶ net::acceptor ──spawn──▶ broker::handler
//!                                        │                        │
//!                                   TaskGroup (drain)      protocol::codec
//!                                                                 │
//!                                                          broker::memory
//! ```
//!
//! Startup loads and re-persists topic metadata, then binds the listener.
//! SIGINT/SIGTERM stops the broker once, the acceptor stops accepting, and
//! in-flight connections are drained within `shutdown.drain_timeout_secs`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use nsq_front::config::{load_config, validate_config, ServerConfig};
use nsq_front::lifecycle::{signals, Program};
use nsq_front::observability::logging;

#[derive(Parser)]
#[command(name = "nsq-front", version, about = "TCP front-end accepting PUB commands")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `broker.data_path`.
    #[arg(long)]
    data_path: Option<String>,

    /// Override `observability.log_level`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn resolve(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(data_path) = self.data_path {
            config.broker.data_path = data_path;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }

        validate_config(&config).map_err(|errors| {
            let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
            format!("invalid configuration: {}", joined.join(", "))
        })?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().resolve()?;
    logging::init(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "nsq-front starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        data_path = %config.broker.data_path,
        max_message_size = config.protocol.max_message_size,
        "Configuration loaded"
    );

    let program = Arc::new(Program::init(config));
    let started = program.start().await?;
    tracing::info!(address = %started.local_addr, "Accepting connections");

    let signal = signals::wait_for_signal().await;
    if let Err(e) = &signal {
        tracing::error!(error = %e, "Signal handling failed, shutting down");
    }

    program.stop();
    if !program.drain(started.server).await {
        tracing::warn!("Exiting with connections still open");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FILE: &str = r#"
[listener]
bind_address = "127.0.0.1:4000"

[broker]
data_path = "/var/lib/nsq-front"

[observability]
log_level = "warn"
"#;

    fn config_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FILE.as_bytes()).unwrap();
        file
    }

    fn resolve(args: &[&str]) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let argv = std::iter::once("nsq-front").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap().resolve()
    }

    #[test]
    fn file_values_apply_without_flags() {
        let file = config_file();
        let config = resolve(&["--config", file.path().to_str().unwrap()]).unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:4000");
        assert_eq!(config.broker.data_path, "/var/lib/nsq-front");
        assert_eq!(config.observability.log_level, "warn");
    }

    #[test]
    fn flags_override_file_values() {
        let file = config_file();
        let config = resolve(&[
            "--config",
            file.path().to_str().unwrap(),
            "--bind",
            "127.0.0.1:5000",
            "--data-path",
            "/tmp/nsq",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:5000");
        assert_eq!(config.broker.data_path, "/tmp/nsq");
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn overridden_values_are_validated() {
        let file = config_file();
        let err = resolve(&["--config", file.path().to_str().unwrap(), "--bind", "not-an-address"])
            .unwrap_err();
        assert!(err.to_string().contains("listener.bind_address"), "{err}");

        let err = resolve(&["--log-level", "loud"]).unwrap_err();
        assert!(err.to_string().contains("observability.log_level"), "{err}");
    }

    #[test]
    fn defaults_without_config_file() {
        let config = resolve(&[]).unwrap();
        assert_eq!(config.listener.bind_address, ServerConfig::default().listener.bind_address);
    }
}
