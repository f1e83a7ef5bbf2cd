mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use ifm_api::routes::{self, PICTURE_ROUTE};
use ifm_api::service::ChannelService;
use ifm_api::state::AppStateInner;
use ifm_db::Database;
use ifm_mail::{LogTransport, MailTransport, SmtpTransport, VerificationMailer};
use ifm_storage::PictureStore;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ifm=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and picture storage
    let db = Arc::new(Database::open(&config.db_path)?);
    let pictures = Arc::new(PictureStore::new(config.picture_dir.clone(), PICTURE_ROUTE).await?);

    let transport: Arc<dyn MailTransport> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpTransport::new(smtp)?),
        None => {
            info!("IFM_SMTP_HOST not set, verification mail will only be logged");
            Arc::new(LogTransport)
        }
    };

    let state = Arc::new(AppStateInner {
        channels: ChannelService::new(db, pictures),
        mailer: VerificationMailer::new(transport, config.mail_from.clone(), config.verification_ttl),
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = routes::router(state, config.max_upload_bytes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("iFM server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
