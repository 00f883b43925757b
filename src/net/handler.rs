//! The per-connection capability the acceptor dispatches to.

use std::future::Future;

use crate::net::connection::ConnectionInfo;

/// Handles one accepted connection to completion.
///
/// The handler owns the connection: dropping it at the end of `handle`
/// closes it. Failures are the handler's own business; nothing is returned
/// to the acceptor.
pub trait ConnectionHandler<C>: Send + Sync + 'static {
    fn handle(&self, conn: C, info: ConnectionInfo) -> impl Future<Output = ()> + Send;
}
