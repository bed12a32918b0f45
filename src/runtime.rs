//! Tokio runtime and shutdown plumbing shared by the servers.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::Result;

/// Run `future` to completion on a fresh multi-threaded runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

/// A token that is cancelled on Ctrl-C. Must be called inside a runtime.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_ctrl_c().await;
        info!("Shutdown signal received");
        trigger.cancel();
    });
    token
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the process can only be killed.
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
