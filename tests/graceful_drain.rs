//! Shutdown and drain behaviour over real sockets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nsq_front::broker::Broker;
use nsq_front::net::{Acceptor, ConnectionHandler, ConnectionInfo};
use nsq_front::Shutdown;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

mod common;

use common::{eventually, TestDaemon};

/// Reads until the peer hangs up, then counts itself finished.
#[derive(Default)]
struct ReadToEnd {
    finished: AtomicUsize,
}

impl ConnectionHandler<TcpStream> for ReadToEnd {
    async fn handle(&self, mut conn: TcpStream, _info: ConnectionInfo) {
        let mut sink = Vec::new();
        let _ = conn.read_to_end(&mut sink).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn serve_waits_for_open_connections() {
    const CLIENTS: usize = 8;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = Acceptor::default();
    let handler = Arc::new(ReadToEnd::default());
    let shutdown = Shutdown::new();

    let server = tokio::spawn({
        let acceptor = acceptor.clone();
        let handler = Arc::clone(&handler);
        let signal = shutdown.clone();
        async move { acceptor.serve(listener, handler, signal).await }
    });

    let mut clients = Vec::new();
    for _ in 0..CLIENTS {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    assert!(eventually(|| acceptor.tasks().outstanding() == CLIENTS).await);

    shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!server.is_finished());
    assert_eq!(handler.finished.load(Ordering::SeqCst), 0);

    // New connections are no longer served.
    assert!(TcpStream::connect(addr).await.is_err());

    for mut client in clients.drain(..CLIENTS - 1) {
        client.shutdown().await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!server.is_finished());

    drop(clients);
    tokio::time::timeout(Duration::from_secs(1), server)
        .await
        .expect("serve should return once the last client leaves")
        .unwrap()
        .unwrap();
    assert_eq!(handler.finished.load(Ordering::SeqCst), CLIENTS);
    assert_eq!(acceptor.tasks().outstanding(), 0);
}

#[tokio::test]
async fn daemon_stop_closes_idle_clients() {
    let daemon = TestDaemon::start().await;

    let mut idle = Vec::new();
    for _ in 0..4 {
        let mut stream = TcpStream::connect(daemon.addr()).await.unwrap();
        stream.write_all(b"  V2").await.unwrap();
        idle.push(stream);
    }
    let tasks = daemon.program.acceptor().tasks().clone();
    assert!(eventually(|| tasks.outstanding() == 4).await);

    assert!(daemon.stop().await);
    assert_eq!(tasks.outstanding(), 0);

    for mut stream in idle {
        let mut buf = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf))
            .await
            .expect("idle client should be closed");
        assert!(matches!(read, Ok(0) | Err(_)));
    }
}

#[tokio::test]
async fn stop_is_safe_to_repeat() {
    let daemon = TestDaemon::start().await;
    daemon.program.stop();
    daemon.program.stop();
    assert!(daemon.broker().shutdown_signal().is_triggered());
    assert!(daemon.stop().await);
}
