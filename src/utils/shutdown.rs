use std::future::Future;

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    on_signal(tokio::signal::ctrl_c()).await
}

/// Resolves once `signal` fires. If the listener could not be installed the
/// error is logged and this never resolves, so the process keeps serving.
pub async fn on_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
