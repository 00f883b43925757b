//! The accept loop.
//!
//! # Responsibilities
//! - Accept connections one at a time and hand each to its own task
//! - Retry transient accept failures, stop on close, report fatal ones
//! - Drain every dispatched task before reporting a graceful stop
//!
//! # Design Decisions
//! - No connection limit and no per-task timeout
//! - A shutdown broadcast is handled exactly like the listener reporting
//!   that it was closed
//! - Transient failures retry forever; with no `accept_retry_delay_ms` the only
//!   pause is a scheduler yield, so sustained descriptor exhaustion can keep
//!   the loop busy

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ListenerConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::task_group::TaskGroup;
use crate::net::connection::ConnectionInfo;
use crate::net::handler::ConnectionHandler;
use crate::net::listener::{classify_accept_error, AcceptFailure, Listener};
use crate::observability::metrics;

/// Failure that ends [`Acceptor::serve`] abnormally.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("listener.accept() error - {0}")]
    Accept(#[source] io::Error),
}

/// Owns the accept loop and the tasks it spawns.
#[derive(Debug, Clone, Default)]
pub struct Acceptor {
    retry_delay: Duration,
    tasks: TaskGroup,
}

impl Acceptor {
    pub fn new(config: &ListenerConfig) -> Self {
        Self {
            retry_delay: Duration::from_millis(config.accept_retry_delay_ms),
            tasks: TaskGroup::new(),
        }
    }

    /// The group holding one task per live connection.
    pub fn tasks(&self) -> &TaskGroup {
        &self.tasks
    }

    /// Accept connections until the listener closes or `shutdown` fires.
    ///
    /// A `shutdown` that already fired before the call stops the loop before
    /// the first accept.
    ///
    /// On a graceful stop this returns only after every handler spawned here
    /// has finished. A fatal accept error returns immediately and leaves
    /// running handlers to finish on their own.
    pub async fn serve<L, H>(
        &self,
        mut listener: L,
        handler: Arc<H>,
        shutdown: Shutdown,
    ) -> Result<(), ServeError>
    where
        L: Listener,
        H: ConnectionHandler<L::Conn>,
    {
        let address = listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        tracing::info!(address = %address, "TCP: listening");

        // Subscribe before checking the flag so a trigger in between is not lost.
        let mut stop = shutdown.subscribe();
        loop {
            if shutdown.is_triggered() {
                tracing::debug!(address = %address, "Shutdown already requested, no longer accepting");
                break;
            }

            let accepted = tokio::select! {
                biased;
                _ = stop.recv() => {
                    tracing::debug!(address = %address, "Shutdown requested, no longer accepting");
                    break;
                }
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((conn, peer)) => self.dispatch(conn, ConnectionInfo::new(peer), &handler),
                Err(err) => {
                    let failure = classify_accept_error(&err);
                    metrics::record_accept_error(failure.as_str());
                    match failure {
                        AcceptFailure::Transient => {
                            tracing::warn!(error = %err, "temporary Accept() failure");
                            self.pause_before_retry().await;
                        }
                        AcceptFailure::Closed => break,
                        AcceptFailure::Fatal => {
                            tracing::error!(address = %address, error = %err, "Accept failed");
                            return Err(ServeError::Accept(err));
                        }
                    }
                }
            }
        }

        drop(listener);
        let outstanding = self.tasks.outstanding();
        if outstanding > 0 {
            tracing::info!(outstanding, "Waiting for connections to drain");
        }
        self.tasks.wait().await;

        tracing::info!(address = %address, "TCP: closing");
        Ok(())
    }

    fn dispatch<C, H>(&self, conn: C, info: ConnectionInfo, handler: &Arc<H>)
    where
        C: Send + 'static,
        H: ConnectionHandler<C>,
    {
        metrics::record_connection_accepted();
        tracing::debug!(
            connection_id = %info.id,
            peer_addr = %info.peer,
            outstanding = self.tasks.outstanding(),
            "Connection accepted"
        );

        let handler = Arc::clone(handler);
        self.tasks.spawn(async move {
            let _active = metrics::ActiveConnection::start();
            handler.handle(conn, info).await;
            tracing::trace!(connection_id = %info.id, "Connection closed");
        });
    }

    async fn pause_before_retry(&self) {
        if self.retry_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}

/// Run an [`Acceptor`] with default settings.
pub async fn serve<L, H>(
    listener: L,
    handler: Arc<H>,
    shutdown: Shutdown,
) -> Result<(), ServeError>
where
    L: Listener,
    H: ConnectionHandler<L::Conn>,
{
    Acceptor::default().serve(listener, handler, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, Semaphore};


    /// Listener fed from a channel; reports `NotConnected` once the sender is gone.
    struct ScriptedListener {
        rx: mpsc::UnboundedReceiver<io::Result<u32>>,
    }

    impl Listener for ScriptedListener {
        type Conn = u32;

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok("127.0.0.1:4150".parse().unwrap())
        }

        async fn accept(&mut self) -> io::Result<(u32, SocketAddr)> {
            match self.rx.recv().await {
                Some(Ok(conn)) => Ok((conn, "127.0.0.1:50000".parse().unwrap())),
                Some(Err(err)) => Err(err),
                None => Err(io::Error::from(io::ErrorKind::NotConnected)),
            }
        }
    }

    fn scripted() -> (mpsc::UnboundedSender<io::Result<u32>>, ScriptedListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, ScriptedListener { rx })
    }

    /// Records handled connections; each handler holds until a permit is released.
    struct GatedHandler {
        gate: Semaphore,
        seen: std::sync::Mutex<Vec<u32>>,
        finished: AtomicUsize,
    }

    impl Default for GatedHandler {
        fn default() -> Self {
            Self {
                gate: Semaphore::new(0),
                seen: std::sync::Mutex::new(Vec::new()),
                finished: AtomicUsize::new(0),
            }
        }
    }

    impl ConnectionHandler<u32> for GatedHandler {
        async fn handle(&self, conn: u32, _info: ConnectionInfo) {
            self.seen.lock().unwrap().push(conn);
            let _permit = self.gate.acquire().await.unwrap();
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn close_with_nothing_outstanding_returns_ok() {
        let (tx, listener) = scripted();
        let shutdown = Shutdown::new();
        drop(tx);

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            serve(listener, Arc::new(GatedHandler::default()), shutdown.clone()),
        )
        .await
        .expect("serve should return promptly");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn waits_for_every_handler_before_returning() {
        let (tx, listener) = scripted();
        let shutdown = Shutdown::new();
        let handler = Arc::new(GatedHandler::default());
        let acceptor = Acceptor::default();

        let server = {
            let acceptor = acceptor.clone();
            let handler = Arc::clone(&handler);
            let signal = shutdown.clone();
            tokio::spawn(async move { acceptor.serve(listener, handler, signal).await })
        };

        for conn in 0..5 {
            tx.send(Ok(conn)).unwrap();
        }
        while acceptor.tasks().outstanding() < 5 {
            tokio::task::yield_now().await;
        }
        drop(tx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!server.is_finished(), "serve returned before handlers finished");

        handler.gate.add_permits(5);
        server.await.unwrap().unwrap();
        assert_eq!(handler.finished.load(Ordering::SeqCst), 5);
        assert_eq!(acceptor.tasks().outstanding(), 0);

        let mut seen = handler.seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn transient_failure_does_not_lose_next_connection() {
        let (tx, listener) = scripted();
        let shutdown = Shutdown::new();
        let handler = Arc::new(GatedHandler::default());
        handler.gate.add_permits(10);

        tx.send(Err(io::Error::from(io::ErrorKind::ConnectionAborted))).unwrap();
        tx.send(Ok(7)).unwrap();
        drop(tx);

        serve(listener, Arc::clone(&handler), shutdown.clone())
            .await
            .unwrap();
        assert_eq!(*handler.seen.lock().unwrap(), vec![7]);
        assert_eq!(handler.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_delay_is_applied_to_transient_failures() {
        let (tx, listener) = scripted();
        let shutdown = Shutdown::new();
        let acceptor = Acceptor::new(&ListenerConfig {
            accept_retry_delay_ms: 30,
            ..ListenerConfig::default()
        });

        tx.send(Err(io::Error::from(io::ErrorKind::Interrupted))).unwrap();
        tx.send(Err(io::Error::from(io::ErrorKind::Interrupted))).unwrap();
        drop(tx);

        let started = std::time::Instant::now();
        acceptor
            .serve(listener, Arc::new(GatedHandler::default()), shutdown.clone())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn fatal_failure_is_reported() {
        let (tx, listener) = scripted();
        let shutdown = Shutdown::new();

        tx.send(Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")))
            .unwrap();

        let err = serve(listener, Arc::new(GatedHandler::default()), shutdown.clone())
            .await
            .unwrap_err();
        let ServeError::Accept(inner) = err;
        assert_eq!(inner.kind(), io::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn shutdown_fired_before_serve_stops_at_once() {
        let (tx, listener) = scripted();
        let shutdown = Shutdown::new();
        let handler = Arc::new(GatedHandler::default());
        shutdown.trigger();

        // A connection is waiting, but the loop must not take it.
        tx.send(Ok(1)).unwrap();
        tokio::time::timeout(
            Duration::from_secs(1),
            serve(listener, Arc::clone(&handler), shutdown.clone()),
        )
        .await
        .expect("serve should return without waiting on the listener")
        .unwrap();
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn shutdown_signal_stops_accepting_and_drains() {
        let (tx, listener) = scripted();
        let shutdown = Shutdown::new();
        let handler = Arc::new(GatedHandler::default());
        let acceptor = Acceptor::default();

        let server = {
            let acceptor = acceptor.clone();
            let handler = Arc::clone(&handler);
            let signal = shutdown.clone();
            tokio::spawn(async move { acceptor.serve(listener, handler, signal).await })
        };

        tx.send(Ok(1)).unwrap();
        while acceptor.tasks().outstanding() < 1 {
            tokio::task::yield_now().await;
        }

        shutdown.trigger();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!server.is_finished());

        handler.gate.add_permits(1);
        server.await.unwrap().unwrap();

        // The sender is still alive: nothing queued after the trigger was accepted.
        let _ = tx.send(Ok(2));
        assert_eq!(*handler.seen.lock().unwrap(), vec![1]);
    }
}
