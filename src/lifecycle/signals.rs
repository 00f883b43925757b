//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT / SIGTERM (Ctrl+C on non-Unix targets)
//! - Report which signal arrived so the caller can stop the program
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Only resolves; stopping is the caller's decision

use std::fmt;

/// A termination request delivered by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => write!(f, "SIGINT"),
            Signal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Resolve when the process is asked to terminate.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let received = tokio::select! {
        _ = sigterm.recv() => Signal::Terminate,
        _ = sigint.recv() => Signal::Interrupt,
    };
    tracing::info!(signal = %received, "Signal received");
    Ok(received)
}

/// Resolve when the process is asked to terminate.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = %Signal::Interrupt, "Signal received");
    Ok(Signal::Interrupt)
}
