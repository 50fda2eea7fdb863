//! Fixed-interval polling loop shared by both engine binaries.

use crate::errors::Result;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Runs `pass` immediately and then every `period` until `shutdown` resolves.
///
/// A pass always runs to completion; shutdown is observed between passes. Errors are
/// logged and the loop keeps going. Ticks missed while a pass was slow are delayed,
/// not bunched up.
pub async fn run_every<F, Fut, T, S>(name: &str, period: Duration, shutdown: S, mut pass: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    T: Debug,
    S: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(engine = name, period_secs = period.as_secs(), "Engine started");
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!(engine = name, "Engine stopping");
                break;
            }
            _ = interval.tick() => match pass().await {
                Ok(report) => debug!(engine = name, ?report, "Tick finished"),
                Err(e) => error!(engine = name, error = %e, "Tick failed"),
            },
        }
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_first_pass_runs_immediately() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut tx = Some(tx);

        run_every(
            "test",
            Duration::from_secs(60),
            async move {
                let _ = rx.await;
            },
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
                async { Ok::<_, Error>(()) }
            },
        )
        .await;

        assert_eq!(passes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_pass_does_not_stop_the_loop() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let watcher = Arc::clone(&passes);

        run_every(
            "test",
            Duration::from_millis(10),
            async move {
                while watcher.load(Ordering::SeqCst) < 2 {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            },
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(Error::Config {
                        message: "boom".to_string(),
                    })
                }
            },
        )
        .await;

        assert!(passes.load(Ordering::SeqCst) >= 2);
    }
}
