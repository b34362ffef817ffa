use bridge_telemetry::targets;
use tokio::sync::watch;
use tracing::{error, info};

/// 等待 Ctrl-C 或 SIGTERM，然后置位停止信号。
pub async fn wait_for_shutdown(stop: watch::Sender<bool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!(target: targets::SESSION, signal = "SIGINT", "shutdown_signal");
                    }
                    _ = sigterm.recv() => {
                        info!(target: targets::SESSION, signal = "SIGTERM", "shutdown_signal");
                    }
                }
            }
            Err(err) => {
                error!(target: targets::SESSION, error = %err, "sigterm_handler_failed");
                if let Err(err) = tokio::signal::ctrl_c().await {
                    error!(target: targets::SESSION, error = %err, "ctrl_c_handler_failed");
                    std::future::pending::<()>().await;
                }
                info!(target: targets::SESSION, signal = "SIGINT", "shutdown_signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target: targets::SESSION, error = %err, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
        info!(target: targets::SESSION, signal = "ctrl_c", "shutdown_signal");
    }

    stop.send_replace(true);
}
