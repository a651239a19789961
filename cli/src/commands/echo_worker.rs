use std::path::PathBuf;

use anyhow::Context;
use executor_core::tokio::TokioGlobal;
use tether::{JobRouter, WorkerServer};

use crate::error::CliResult;

pub fn execute(socket: PathBuf) -> CliResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let router = JobRouter::new().fallback(|envelope| {
            tracing::info!(
                type_tag = envelope.type_tag,
                bytes = envelope.payload.len(),
                "echoing job"
            );
            envelope
        });

        let _server = WorkerServer::new(router, &socket, TokioGlobal)
            .await
            .with_context(|| format!("failed to listen on {}", socket.display()))?;

        tracing::info!(path = %socket.display(), "echo worker ready");

        // Serve until the process is killed
        std::future::pending::<()>().await;
        Ok::<(), anyhow::Error>(())
    })
}
