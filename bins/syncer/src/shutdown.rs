use std::io;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::warn;

/// Process-wide stop flag, raised once by SIGINT or SIGTERM.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Register the signal handlers now and watch them for the rest of the process.
    pub fn install() -> io::Result<Self> {
        let mut int = signal(SignalKind::interrupt())?;
        let mut term = signal(SignalKind::terminate())?;
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::select! {
                _ = int.recv() => warn!("SIGINT received, stopping"),
                _ = term.recv() => warn!("SIGTERM received, stopping"),
            }
            let _ = tx.send(true);
        });
        Ok(Shutdown { rx })
    }

    /// A flag driven by `rx`, for callers that own the sender.
    pub fn from_receiver(rx: watch::Receiver<bool>) -> Self {
        Shutdown { rx }
    }

    /// Whether a stop was requested.
    pub fn requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop is requested; never if the sender goes away first.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
