//! NextBuy Commerce - storefront backend

use std::sync::Arc;

use anyhow::{Context, Result};
use nextbuy_commerce::bus::{EventPublisher, LogPublisher, NatsPublisher};
use nextbuy_commerce::config::AppConfig;
use nextbuy_commerce::http::{self, AppState, Backends};
use nextbuy_commerce::mail::{BrevoMailer, LogMailer, Mailer};
use nextbuy_commerce::payments::RazorpayGateway;
use nextbuy_commerce::pricing::PricingEngine;
use nextbuy_commerce::store::{MemoryStore, PgStore};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = AppConfig::from_env()?;

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client, "nextbuy")),
            Err(error) => {
                tracing::warn!(%error, "NATS unavailable, events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };
    let mailer: Arc<dyn Mailer> = match &config.brevo_api_key {
        Some(key) => Arc::new(BrevoMailer::new(key.clone(), config.sender.clone())),
        None => Arc::new(LogMailer),
    };
    let gateway = Arc::new(RazorpayGateway::new(config.razorpay_key_id.clone(), config.razorpay_key_secret.clone()));

    let backends = match &config.database_url {
        Some(url) => {
            let store = Arc::new(PgStore::connect(url, 10).await.context("connecting to database")?);
            store.migrate().await.context("running migrations")?;
            Backends { carts: store.clone(), catalog: store.clone(), orders: store.clone(), wishlists: store.clone(), profiles: store, gateway, mailer, events }
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            let store = Arc::new(MemoryStore::new());
            Backends { carts: store.clone(), catalog: store.clone(), orders: store.clone(), wishlists: store.clone(), profiles: store, gateway, mailer, events }
        }
    };

    let state = AppState::new(backends, PricingEngine::new(config.discount_rate, &config.currency));
    let app = http::router(state);

    let addr = config.bind_addr()?;
    tracing::info!("NextBuy Commerce listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => { stream.recv().await; }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
