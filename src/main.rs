use std::sync::Arc;

use axum::Router;
use diesel_migrations::{embed_migrations, EmbeddedMigrations};
use tokio::net::TcpListener;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use storefront::cart;
use storefront::cart::engine::CartEngine;
use storefront::jobs::{self, ShopJobHandler, WorkerOptions};
use storefront::notification::gate::NotificationGate;
use storefront::notification::mailer::{Mailer, RecordingMailer, SmtpMailer};
use storefront::product;
use storefront::report::aggregator::ReportAggregator;
use storefront::store::pg::{self, PgAdminDirectory, PgStore};
use storefront::utils::{config::AppConfig, handler_404};
use storefront::AppState;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env().expect("invalid configuration");

    let pool = pg::build_pool(&config.database_url)
        .await
        .expect("failed to create db pool");

    let store = Arc::new(PgStore::new(pool.clone()));
    let admins = Arc::new(PgAdminDirectory::new(
        pool.clone(),
        config.admin_email.clone(),
    ));
    let mailer: Arc<dyn Mailer> = match config.smtp.clone() {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)),
        None => {
            warn!("SMTP is not configured; outbound mail will only be recorded");
            Arc::new(RecordingMailer::new())
        }
    };

    let engine = CartEngine::new(store.clone(), store.clone());
    let gate = NotificationGate::new(store.clone(), admins.clone(), mailer.clone());
    let aggregator = ReportAggregator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        admins,
        mailer,
    );
    let handler = Arc::new(ShopJobHandler::new(
        store.clone(),
        gate,
        aggregator,
        config.low_stock_threshold,
    ));
    let (dispatcher, _worker) = jobs::spawn(handler, WorkerOptions::default());

    let state = AppState {
        engine,
        products: store,
        dispatcher,
    };

    let routes = Router::new()
        .merge(product::routes::get_routes())
        .merge(cart::routes::get_routes())
        .fallback(handler_404)
        .with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    tracing::info!(addr = %config.bind_addr, "storefront listening");
    axum::serve(listener, routes).await.unwrap();
}
