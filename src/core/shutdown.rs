use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Turns SIGINT/SIGTERM into cancellation of `token`.
///
/// The handlers are installed before this returns, so a signal that arrives
/// right after the call is still seen. This task is the only producer of
/// cancellation. Signals arriving after the first one are logged and dropped,
/// so the child is never interrupted twice.
pub fn spawn_signal_listener(token: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    let mut signals = ShutdownSignals::install()?;

    Ok(tokio::spawn(async move {
        while signals.recv().await {
            if token.is_cancelled() {
                warn!("Shutdown already in progress; ignoring signal");
            } else {
                info!("Shutdown signal received");
                token.cancel();
            }
        }
        warn!("Signal streams closed; no further signals will be handled");
    }))
}

#[cfg(unix)]
struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// `false` once the streams can no longer deliver signals.
    async fn recv(&mut self) -> bool {
        tokio::select! {
            received = self.interrupt.recv() => received.is_some(),
            received = self.terminate.recv() => received.is_some(),
        }
    }
}

#[cfg(windows)]
struct ShutdownSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> bool {
        self.ctrl_c.recv().await.is_some()
    }
}
