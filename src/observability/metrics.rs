//! Metrics collection and exposition.
//!
//! # Metrics
//! - `nsq_connections_accepted_total` (counter)
//! - `nsq_connections_active` (gauge): handler tasks still running
//! - `nsq_accept_errors_total` (counter): by `kind` (transient, closed, fatal)
//! - `nsq_messages_published_total` (counter)
//! - `nsq_protocol_errors_total` (counter): by `kind`
//!
//! Recording is a no-op until a recorder is installed, so tests and
//! deployments without the exporter pay almost nothing.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection_accepted() {
    ::metrics::counter!("nsq_connections_accepted_total").increment(1);
}

pub fn record_accept_error(kind: &'static str) {
    ::metrics::counter!("nsq_accept_errors_total", "kind" => kind).increment(1);
}

pub fn record_message_published() {
    ::metrics::counter!("nsq_messages_published_total").increment(1);
}

pub fn record_protocol_error(kind: &'static str) {
    ::metrics::counter!("nsq_protocol_errors_total", "kind" => kind).increment(1);
}

/// Keeps `nsq_connections_active` raised for as long as it lives.
#[derive(Debug)]
pub struct ActiveConnection(());

impl ActiveConnection {
    pub fn start() -> Self {
        ::metrics::gauge!("nsq_connections_active").increment(1.0);
        Self(())
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        ::metrics::gauge!("nsq_connections_active").decrement(1.0);
    }
}
