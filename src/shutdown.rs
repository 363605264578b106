//! OS signal handling.

use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Resolve on Ctrl-C, or SIGTERM on unix.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received interrupt"),
        _ = terminate => info!("received terminate"),
    }
}

/// Cancel `token` when a shutdown signal arrives. Stops listening once the
/// token is cancelled by someone else.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<bool> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = wait_for_signal() => {
                token.cancel();
                true
            }
        }
    })
}
