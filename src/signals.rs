//! Ctrl+C delivery for the recording phase.
//!
//! The handler is installed when [`Interrupts::listen`] returns, before any
//! recorder is spawned. Recorders run in their own process groups and never see
//! the terminal's Ctrl+C, so an interrupt that arrives while they are starting
//! must still reach `record-bag` instead of killing it outright.

use anyhow::{Context, Result};

use crate::launcher::Interrupt;

pub struct Interrupts {
    #[cfg(unix)]
    inner: tokio::signal::unix::Signal,
    #[cfg(windows)]
    inner: tokio::signal::windows::CtrlC,
}

impl Interrupts {
    pub fn listen() -> Result<Self> {
        #[cfg(unix)]
        let inner = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .context("failed to listen for ctrl-c")?;
        #[cfg(windows)]
        let inner = tokio::signal::windows::ctrl_c().context("failed to listen for ctrl-c")?;

        Ok(Self { inner })
    }

    /// Resolves on the next interrupt. Pending forever once the stream closes.
    pub async fn recv(&mut self) {
        if self.inner.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

impl Interrupt for Interrupts {
    async fn take_pending(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.recv() => true,
            _ = std::future::ready(()) => false,
        }
    }
}
