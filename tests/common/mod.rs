//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use nsq_front::broker::MemoryBroker;
use nsq_front::lifecycle::{Program, Started};
use nsq_front::ServerConfig;
use tempfile::TempDir;

/// A daemon bound to an ephemeral port with its own data directory.
pub struct TestDaemon {
    pub program: Arc<Program<MemoryBroker>>,
    pub started: Started,
    _data: Option<TempDir>,
}

impl TestDaemon {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(customize: impl FnOnce(&mut ServerConfig)) -> Self {
        let data = TempDir::new().unwrap();
        let mut daemon = Self::start_in(data.path(), customize).await;
        daemon._data = Some(data);
        daemon
    }

    /// Start a daemon whose metadata lives in `data_path`, owned by the caller.
    pub async fn start_in(data_path: &Path, customize: impl FnOnce(&mut ServerConfig)) -> Self {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        config.broker.data_path = data_path.to_string_lossy().into_owned();
        config.shutdown.drain_timeout_secs = 5;
        customize(&mut config);

        let program = Arc::new(Program::init(config));
        let started = program.start().await.unwrap();
        Self {
            program,
            started,
            _data: None,
        }
    }

    pub fn addr(&self) -> std::net::SocketAddr {
        self.started.local_addr
    }

    pub fn broker(&self) -> &Arc<MemoryBroker> {
        self.program.broker()
    }

    pub async fn stop(self) -> bool {
        self.program.stop();
        self.program.drain(self.started.server).await
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
