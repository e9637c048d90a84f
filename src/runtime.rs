//! Runtime - local task spawning, graceful shutdown and signal handling

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Spawn a non-`Send` task on the current thread's executor.
///
/// Natively this must be called inside a `tokio::task::LocalSet`.
pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    #[cfg(feature = "native")]
    {
        tokio::task::spawn_local(future);
    }

    #[cfg(all(feature = "wasm", not(feature = "native")))]
    {
        wasm_bindgen_futures::spawn_local(future);
    }
}

/// Yield once to the executor so tasks woken before us run first.
pub async fn yield_now() {
    YieldNow(false).await
}

// tokio::task::yield_now is native only; this one also runs under wasm_bindgen_futures.
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            return Poll::Ready(());
        }
        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[cfg(feature = "native")]
pub use shutdown::{install_signal_handlers, Shutdown};

#[cfg(feature = "native")]
mod shutdown {
    use std::sync::Arc;
    use tokio::sync::{broadcast, RwLock};

    /// Shutdown signal broadcaster
    #[derive(Clone)]
    pub struct Shutdown {
        sender: broadcast::Sender<()>,
        triggered: Arc<RwLock<bool>>,
    }

    impl Default for Shutdown {
        fn default() -> Self { Self::new() }
    }

    impl Shutdown {
        pub fn new() -> Self {
            let (sender, _) = broadcast::channel(1);
            Self { sender, triggered: Arc::new(RwLock::new(false)) }
        }

        /// Subscribe to shutdown signal
        pub fn subscribe(&self) -> broadcast::Receiver<()> {
            self.sender.subscribe()
        }

        /// Trigger shutdown once; later calls are ignored
        pub async fn trigger(&self) {
            let mut triggered = self.triggered.write().await;
            if !*triggered {
                *triggered = true;
                let _ = self.sender.send(());
            }
        }

        pub async fn is_triggered(&self) -> bool {
            *self.triggered.read().await
        }
    }

    /// Install SIGINT/SIGTERM handlers and return the shutdown handle
    pub fn install_signal_handlers() -> Shutdown {
        let shutdown = Shutdown::new();
        let handle = shutdown.clone();

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let (mut sigterm, mut sigint) =
                    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                        (Ok(term), Ok(int)) => (term, int),
                        (Err(e), _) | (_, Err(e)) => {
                            tracing::error!(error = %e, "signal handlers unavailable");
                            return;
                        }
                    };

                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT"),
                }
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Ctrl+C handler unavailable");
                    return;
                }
                tracing::info!("Received Ctrl+C");
            }

            handle.trigger().await;
        });

        shutdown
    }

}
