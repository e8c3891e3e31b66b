// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{process, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use brand_admin_console::{
    api::router,
    config::Config,
    logging, shutdown,
    state::AppState,
    storage::AdminDatabase,
};

/// Grace period for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = logging::init(config.log_format) {
        eprintln!("failed to initialise logging: {e}");
        process::exit(1);
    }
    info!(?config, "starting brand admin console");

    let db = AdminDatabase::open(&config.database_path).expect("Failed to open database");

    if let Some(email) = &config.seed_admin_email {
        let admin = db
            .users()
            .ensure_admin(email)
            .expect("Failed to seed admin user");
        info!(user_id = %admin.id, "seed admin ready");
    }

    let state = AppState::from_config(&config, db).expect("Failed to build application state");
    let app = router(state);
    let addr = config.bind_addr().expect("Failed to parse bind address");

    let token = CancellationToken::new();
    let handle = Handle::new();

    tokio::spawn({
        let token = token.clone();
        async move {
            if let Err(e) = shutdown::listen(token).await {
                error!("failed to listen for shutdown signal: {e}");
            }
        }
    });
    tokio::spawn({
        let handle = handle.clone();
        async move {
            token.cancelled().await;
            info!("shutting down");
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    let served = match &config.tls {
        Some(tls) => {
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .expect("Failed to load TLS certificate and key");

            info!(%addr, "listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            info!(%addr, "listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    };

    if let Err(e) = served {
        error!("server failed: {e}");
        process::exit(1);
    }
    info!("server stopped");
}
