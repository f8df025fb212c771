// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cryptocase_server::{
    api::router,
    auth::Role,
    blockchain::{ConfirmationWorker, NodeHeartbeatTask},
    config::{LogFormat, SeedAdmin, ServerConfig},
    models::Department,
    state::{AuthConfig, AppState},
    storage::{Database, NewUser, NodeRepository, StorageResult, UserRepository},
};

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Create the bootstrap administrator unless the username is taken.
fn seed_admin(db: &Database, seed: &SeedAdmin) -> StorageResult<()> {
    let users = UserRepository::new(db);
    if users.find_by_username(&seed.username)?.is_some() {
        return Ok(());
    }
    let admin = users.create(NewUser {
        username: seed.username.clone(),
        password: seed.password.clone(),
        full_name: "Portal Administrator".to_string(),
        badge_number: None,
        department: Department::CyberCrimeCell,
        role: Role::Admin,
    })?;
    tracing::info!(user_id = %admin.id, username = %admin.username, "Seeded administrator account");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(LogFormat::from_env());
    let config = ServerConfig::from_env();
    tracing::info!(?config, "Starting cryptocase portal");

    let db = Arc::new(Database::open(&config.database_path())?);
    if let Some(seed) = config.seed_admin.clone() {
        let db = db.clone();
        tokio::task::spawn_blocking(move || seed_admin(&db, &seed)).await??;
    }
    let seeded_nodes = NodeRepository::new(&db).seed_defaults()?;
    if seeded_nodes > 0 {
        tracing::info!(count = seeded_nodes, "Registered default confirmation nodes");
    }

    let auth_config = AuthConfig::from(&config);
    if !auth_config.is_production() {
        tracing::warn!("JWT_SECRET not set; running in development mode with unverified tokens");
    }
    let state = AppState::new(db.clone(), auth_config);

    let shutdown = CancellationToken::new();
    let confirmer = ConfirmationWorker::new(db.clone(), state.events.clone())
        .with_delay(config.confirmation_delay)
        .with_poll_interval(config.poll_interval);
    let heartbeat = NodeHeartbeatTask::new(db.clone(), state.events.clone())
        .with_interval(config.heartbeat_interval);
    let workers = [
        tokio::spawn(confirmer.run(shutdown.clone())),
        tokio::spawn(heartbeat.run(shutdown.clone())),
    ];

    let app = router(state, config.static_dir.as_deref());
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Portal listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    for worker in workers {
        if let Err(e) = worker.await {
            tracing::warn!(error = %e, "Background task ended abnormally");
        }
    }
    tracing::info!("Server stopped");
    Ok(())
}
