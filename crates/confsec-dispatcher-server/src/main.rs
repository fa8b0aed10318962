//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Dispatcher server — thin entry point for the Axum HTTP service.
//!
//! All routing and request-handling logic lives in `confsec_dispatcher`.
//! This binary is responsible only for: env config loading, the one-shot
//! evidence hand-off, server binding, and graceful shutdown.

use anyhow::Result;
use confsec_dispatcher::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    tracing::info!(
        "confsec-dispatcher v{} starting on port {}",
        env!("CARGO_PKG_VERSION"),
        config.port
    );

    let (_evidence, summary) =
        receive_evidence(&config.evidence_socket_path, config.evidence_handoff_timeout).await?;

    schedule_self_termination(summary.earliest_nvidia_cert_expiry);

    let state = AppState::new(config.clone(), summary);
    let in_flight = state.in_flight.clone();
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("listening on 0.0.0.0:{}", config.port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("no longer accepting connections, draining in-flight workers");
    in_flight.wait().await;
    tracing::info!("dispatcher shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, no longer accepting new connections");
}
