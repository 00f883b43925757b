//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the broker engine from configuration
//! - Load metadata, persist it back, bind the listener, start accepting
//! - Stop the engine exactly once, however many callers ask
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned before traffic is accepted
//! - The listener starts last
//! - A fatal accept error stops the engine and exits the process with status 1

use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::broker::{Broker, BrokerError, MemoryBroker, ProtocolHandler};
use crate::config::ServerConfig;
use crate::net::{self, Acceptor, ListenerError};
use crate::observability::metrics;
use crate::protocol::FrameLimits;

/// Errors that prevent the program from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load metadata - {0}")]
    LoadMetadata(#[source] BrokerError),

    #[error("failed to persist metadata - {0}")]
    PersistMetadata(#[source] BrokerError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to start metrics exporter - {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),
}

/// A running accept loop.
#[derive(Debug)]
pub struct Started {
    pub local_addr: SocketAddr,
    pub server: JoinHandle<()>,
}

/// The daemon: configuration, broker engine, and the one-shot stop guard.
#[derive(Debug)]
pub struct Program<B> {
    config: ServerConfig,
    broker: Arc<B>,
    acceptor: Acceptor,
    stopped: Once,
}

impl Program<MemoryBroker> {
    /// Construct the default in-memory engine from configuration.
    pub fn init(config: ServerConfig) -> Self {
        let broker = Arc::new(MemoryBroker::new(&config.broker));
        Self::with_broker(config, broker)
    }
}

impl<B: Broker> Program<B> {
    pub fn with_broker(config: ServerConfig, broker: Arc<B>) -> Self {
        let acceptor = Acceptor::new(&config.listener);
        Self {
            config,
            broker,
            acceptor,
            stopped: Once::new(),
        }
    }

    pub fn broker(&self) -> &Arc<B> {
        &self.broker
    }

    pub fn acceptor(&self) -> &Acceptor {
        &self.acceptor
    }

    /// Restore state and start accepting connections in the background.
    pub async fn start(self: &Arc<Self>) -> Result<Started, StartupError> {
        self.broker.load_metadata().map_err(StartupError::LoadMetadata)?;
        self.broker
            .persist_metadata()
            .map_err(StartupError::PersistMetadata)?;

        let observability = &self.config.observability;
        if observability.metrics_enabled {
            let addr = observability
                .metrics_address
                .parse()
                .map_err(|_| StartupError::MetricsAddress(observability.metrics_address.clone()))?;
            metrics::init_metrics(addr)?;
        }

        let listener = net::bind(&self.config.listener).await?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        let handler = Arc::new(ProtocolHandler::new(
            Arc::clone(&self.broker),
            FrameLimits::from(&self.config.protocol),
        ));
        let shutdown = self.broker.shutdown_signal();

        let program = Arc::clone(self);
        let server = tokio::spawn(async move {
            if let Err(e) = program.acceptor.serve(listener, handler, shutdown).await {
                tracing::error!(error = %e, "Accept loop failed, exiting");
                program.stop();
                std::process::exit(1);
            }
        });

        Ok(Started { local_addr, server })
    }

    /// Stop the broker engine. Only the first call has any effect.
    pub fn stop(&self) {
        self.stopped.call_once(|| {
            tracing::info!("Stopping");
            self.broker.exit();
        });
    }

    /// Wait for the accept loop to drain, bounded by the configured timeout.
    ///
    /// Returns `false` if connections were still open when the timeout expired.
    pub async fn drain(&self, server: JoinHandle<()>) -> bool {
        let timeout = Duration::from_secs(self.config.shutdown.drain_timeout_secs);
        match tokio::time::timeout(timeout, server).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Accept loop task failed");
                true
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    outstanding = self.acceptor.tasks().outstanding(),
                    "Drain timed out with connections still open"
                );
                false
            }
        }
    }
}
