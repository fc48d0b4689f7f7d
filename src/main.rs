//! Storefront - catalog, cart, checkout and admin back office

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::config::Config;
use storefront::events::EventPublisher;
use storefront::payment::{PaymentGateway, PaymentGateways, PayPalGateway, StripeGateway};
use storefront::state::AppState;
use storefront::store::{memory::MemoryStore, postgres::PgStore, Repositories};

const MAX_DB_CONNECTIONS: u32 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "storefront=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::info!(?config, "configuration loaded");

    let repos = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, MAX_DB_CONNECTIONS).await?;
            store.migrate().await?;
            Repositories::from_store(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Repositories::from_store(Arc::new(MemoryStore::new()))
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, events will only be logged");
                None
            }
        },
        None => None,
    };

    let gateways = PaymentGateways {
        paypal: config.paypal.as_ref().map(|p| {
            Arc::new(PayPalGateway::new(&p.api_url, &p.client_id, &p.secret)) as Arc<dyn PaymentGateway>
        }),
        stripe: config.stripe_secret_key.as_ref().map(|key| Arc::new(StripeGateway::new(key)) as Arc<dyn PaymentGateway>),
    };

    let state = AppState::builder(repos)
        .gateways(gateways)
        .events(EventPublisher::new(nats))
        .page_size(config.page_size)
        .stripe_webhook_secret(config.stripe_webhook_secret.clone())
        .build();
    let app = storefront::routes::router(state);

    let addr = config.socket_addr();
    tracing::info!("Storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining connections");
}
