//! Storelife API server binary.
//!
//! Wires PostgreSQL, Redis and (optionally) WeCom into the API router and runs
//! the directory sync schedule alongside it.

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use storelife_api::config::ApiConfig;
use storelife_core::auth::redis_store::RedisSessionStore;
use storelife_core::auth::{IdleSessionSweeper, SessionManager};
use storelife_core::directory::DirectorySource;
use storelife_core::directory::postgres::PgDirectoryStore;
use storelife_core::directory::schedule::{SyncSchedule, SyncScheduler};
use storelife_core::directory::sync::DirectorySync;
use storelife_core::directory::wecom::WeComClient;
use storelife_core::entities::PgEntityStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "storelife_server", about = "Storelife API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/storelife"
    )]
    database_url: String,

    /// Redis connection URL (sessions and token blacklist).
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,

    /// Do not schedule directory syncs (manual triggers still work).
    #[arg(long, default_value_t = false)]
    no_sync: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,storelife_api=debug,storelife_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    config.bind_addr = args.bind_addr;
    config.database_url = args.database_url;
    config.redis_url = args.redis_url;
    if args.no_sync {
        config.sync_enabled = false;
    }

    info!(
        bind_addr = %config.bind_addr,
        max_connections = args.max_connections,
        "starting storelife_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    info!("running database migrations");
    storelife_api::migrate(&pool).await?;

    let session_store = RedisSessionStore::connect(&config.redis_url).await?;
    let users = Arc::new(PgDirectoryStore::new(pool.clone()));
    let entities = Arc::new(PgEntityStore::new(pool));
    let sessions = Arc::new(SessionManager::new(
        Arc::new(session_store),
        users.clone(),
        config.token_settings(),
    ));

    let directory: Option<Arc<dyn DirectorySource>> = match &config.wecom {
        Some(wecom) => Some(Arc::new(WeComClient::new(wecom.client_config())?)),
        None => {
            warn!("WECOM_CORP_ID/WECOM_CORP_SECRET not set, directory sync and SSO disabled");
            None
        }
    };
    let sync = directory
        .as_ref()
        .map(|source| Arc::new(DirectorySync::new(source.clone(), users.clone())));

    let shutdown = CancellationToken::new();
    let mut background = Vec::new();
    if config.session_sweep_interval_secs > 0 {
        background.push(
            IdleSessionSweeper::new(
                sessions.clone(),
                std::time::Duration::from_secs(config.session_sweep_interval_secs),
                shutdown.clone(),
            )
            .spawn(),
        );
    }
    if let Some(sync) = &sync
        && config.sync_enabled
    {
        let schedule = SyncSchedule::new(config.sync_daily_hour, config.sync_utc_offset_hours)?;
        info!(
            daily_hour = config.sync_daily_hour,
            utc_offset_hours = config.sync_utc_offset_hours,
            "directory sync scheduled"
        );
        background.extend(SyncScheduler::new(sync.clone(), schedule, shutdown.clone()).spawn());
    }

    let state = storelife_api::AppState {
        sessions,
        users,
        entities,
        directory,
        sync,
        config: config.clone(),
    };
    let app = storelife_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let signal = shutdown.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown requested");
            signal.cancel();
        })
        .await;

    shutdown.cancel();
    for handle in background {
        let _ = handle.await;
    }

    result?;
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    first_signal(tokio::signal::ctrl_c(), sigterm()).await;
}

#[cfg(unix)]
async fn sigterm() -> std::io::Result<()> {
    let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    sig.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn sigterm() -> std::io::Result<()> {
    std::future::pending().await
}

/// Waits for whichever listener fires first. A listener that cannot be
/// installed is logged and left pending so the other one still works.
async fn first_signal<C, T>(ctrl_c: C, terminate: T)
where
    C: Future<Output = std::io::Result<()>>,
    T: Future<Output = std::io::Result<()>>,
{
    let ctrl_c = async {
        if let Err(e) = ctrl_c.await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        if let Err(e) = terminate.await {
            warn!(error = %e, "failed to listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use super::*;

    fn broken() -> io::Result<()> {
        Err(io::Error::other("no signal handler"))
    }

    #[tokio::test]
    async fn failed_ctrl_c_falls_back_to_sigterm() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let waiter = tokio::spawn(first_signal(async { broken() }, async {
            let _ = rx.await;
            Ok(())
        }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "a failed listener must not trigger shutdown");

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("SIGTERM did not trigger shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn ctrl_c_triggers_shutdown() {
        tokio::time::timeout(
            Duration::from_secs(1),
            first_signal(async { Ok(()) }, std::future::pending()),
        )
        .await
        .expect("ctrl-c did not trigger shutdown");
    }
}
