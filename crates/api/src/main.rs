use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use fieldops_api::app::{AppServices, build_app};
use fieldops_api::context::HeaderIdentityResolver;
use fieldops_infra::{FulfillmentStore, InMemoryFulfillmentStore, PostgresFulfillmentStore, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fieldops_observability::init();

    let settings = Settings::from_env().context("invalid configuration")?;

    let pool = match &settings.database_url {
        Some(url) => Some(
            PgPoolOptions::new()
                .max_connections(settings.db_max_connections)
                .connect(url)
                .await
                .context("failed to connect to postgres")?,
        ),
        None => None,
    };

    let store: Arc<dyn FulfillmentStore> = match &pool {
        Some(pool) => {
            let store = PostgresFulfillmentStore::new(pool.clone(), settings.fulfillment.lock_timeout);
            if settings.migrate {
                store.migrate().await.context("failed to apply schema")?;
            }
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(InMemoryFulfillmentStore::new())
        }
    };

    let attachments = settings.attachment_store();
    if attachments.is_none() {
        tracing::warn!("FIELDOPS_ATTACHMENT_DIR not set; inline attachments will be rejected");
    }

    let services = Arc::new(AppServices::new(
        store,
        attachments,
        &settings.fulfillment,
        settings.environment,
    ));
    let app = build_app(services, Arc::new(HeaderIdentityResolver));

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(pool) = pool {
        pool.close().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
