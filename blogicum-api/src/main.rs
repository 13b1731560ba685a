use crate::server::{AuthConfig, ServerState};
use blogicum_common::{
    snowflake::{ProcessId, WorkerId},
    util::PositiveDuration,
};
use blogicum_db::client::{DbClient, DbError};
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration as StdDuration,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("AUTH_TOKEN_LIFETIME_HOURS must be between 0 and {MAX_AUTH_TOKEN_LIFETIME_HOURS}, got {0}")]
    TokenLifetime(i64),
    #[error("Error connecting to the database: {0}")]
    DbConnect(sqlx::Error),
    #[error("Error preparing the database: {0}")]
    Db(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

/// Ten years.
const MAX_AUTH_TOKEN_LIFETIME_HOURS: i64 = 24 * 366 * 10;

fn default_auth_token_lifetime_hours() -> i64 {
    24 * 14
}

fn default_auth_purge_interval_secs() -> u64 {
    60 * 60
}

fn default_database_max_connections() -> u32 {
    10
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    worker_id: WorkerId,
    process_id: ProcessId,
    /// Zero issues tokens that never expire.
    #[serde(default = "default_auth_token_lifetime_hours")]
    auth_token_lifetime_hours: i64,
    #[serde(default = "default_auth_purge_interval_secs")]
    auth_purge_interval_secs: u64,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "blogicum_api=debug,\
                blogicum_common=debug,\
                blogicum_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

/// Zero hours issues tokens that never expire.
fn token_lifetime(hours: i64) -> Result<Option<PositiveDuration>, InitError> {
    if !(0..=MAX_AUTH_TOKEN_LIFETIME_HOURS).contains(&hours) {
        return Err(InitError::TokenLifetime(hours));
    }

    Ok(PositiveDuration::new(Duration::hours(hours)))
}

/// Deletes expired auth tokens every `period` until cancelled.
async fn purge_expired_auths(
    db_client: Arc<DbClient>,
    period: StdDuration,
    cancellation: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            () = cancellation.cancelled() => break,
            _ = interval.tick() => {}
        }

        match db_client
            .delete_expired_auths(OffsetDateTime::now_utc())
            .await
        {
            Ok(0) => {}
            Ok(purged) => info!(purged, "Purged expired auth tokens"),
            Err(err) => error!(error = %err, "Purging expired auth tokens failed"),
        }
    }

    debug!("Stopped purging auth tokens");
}

async fn shutdown_signal(cancellation: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Listening for ctrl-c failed");
    }

    info!("Shutting down");
    cancellation.cancel();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    let auth_config = AuthConfig {
        token_lifetime: token_lifetime(env.auth_token_lifetime_hours)?,
    };

    let pool = PgPoolOptions::new()
        .max_connections(env.database_max_connections)
        .connect(&env.database_url)
        .await
        .map_err(InitError::DbConnect)?;
    let db_client = Arc::new(DbClient::new(pool, env.worker_id, env.process_id));
    db_client.migrate().await?;

    let cancellation = CancellationToken::new();
    let purge_task = tokio::spawn(purge_expired_auths(
        Arc::clone(&db_client),
        StdDuration::from_secs(env.auth_purge_interval_secs.max(1)),
        cancellation.child_token(),
    ));

    let state = ServerState {
        db_client,
        auth_config,
    };
    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().with_state(state).layer(tracing_layer);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancellation.clone()))
        .await
        .map_err(InitError::TcpServe)?;

    cancellation.cancel();
    if let Err(err) = purge_task.await {
        error!(error = %err, "Auth purge task panicked");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{InitError, MAX_AUTH_TOKEN_LIFETIME_HOURS, token_lifetime};
    use time::Duration;

    #[test]
    fn token_lifetime_bounds() {
        assert_eq!(token_lifetime(0).unwrap(), None);
        assert_eq!(
            token_lifetime(336).unwrap().map(|lifetime| lifetime.get()),
            Some(Duration::hours(336))
        );
        assert!(token_lifetime(MAX_AUTH_TOKEN_LIFETIME_HOURS).unwrap().is_some());

        assert!(matches!(
            token_lifetime(-1),
            Err(InitError::TokenLifetime(-1))
        ));
        assert!(matches!(
            token_lifetime(i64::MAX),
            Err(InitError::TokenLifetime(i64::MAX))
        ));
    }
}
