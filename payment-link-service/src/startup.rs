//! Application startup and lifecycle management.

use crate::config::{Config, StoreBackend};
use crate::handlers;
use crate::middleware::{capabilities, require_capability, CapabilityPolicy};
use crate::services::{
    Clock, EventIngress, ExpirySweeper, InMemoryTransactionStore, IntentSettings,
    MongoTransactionStore, PayOsClient, PaymentIntentCreator, PaymentProvider, SystemClock,
    TransactionStore,
};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    routing::{get, post},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn TransactionStore>,
    pub creator: PaymentIntentCreator,
    pub ingress: EventIngress,
    pub sweeper: ExpirySweeper,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn TransactionStore>,
        provider: Arc<dyn PaymentProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let expiry_window = config.reconciliation.expiry_window();
        let settings = IntentSettings {
            public_base_url: config.callbacks.public_base_url.clone(),
            currency: config.provider.currency.clone(),
            default_description: config.reconciliation.default_description.clone(),
            expiry_window,
            provider_timeout: config.provider.timeout(),
        };

        Self {
            creator: PaymentIntentCreator::new(
                store.clone(),
                provider,
                clock.clone(),
                settings,
            ),
            ingress: EventIngress::new(store.clone(), clock.clone(), expiry_window),
            sweeper: ExpirySweeper::new(store.clone(), clock, expiry_window),
            store,
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let policy = CapabilityPolicy::new(
        state.config.authorization.enabled,
        state.config.authorization.roles.clone(),
    );

    let create_routes = Router::new()
        .route("/create", post(handlers::payments::create_payment))
        .route_layer(from_fn_with_state(
            policy.require(capabilities::PAYMENT_LINK_CREATE),
            require_capability,
        ));

    let history_routes = Router::new()
        .route("/history", get(handlers::payments::payment_history))
        .route(
            "/transactions/:order_code",
            get(handlers::payments::get_transaction),
        )
        .route_layer(from_fn_with_state(
            policy.require(capabilities::PAYMENT_HISTORY_READ),
            require_capability,
        ));

    // Called by payOS and by the shopper's browser; no caller identity.
    let callback_routes = Router::new()
        .route("/webhook", post(handlers::webhook::payos_webhook))
        .route("/success", get(handlers::redirect::payment_success))
        .route("/cancel", get(handlers::redirect::payment_cancel));

    let payment_routes = Router::new()
        .merge(create_routes)
        .merge(history_routes)
        .merge(callback_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .nest("/payment", payment_routes)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .with_state(state)
}

async fn connect_store(config: &Config) -> Result<Arc<dyn TransactionStore>, AppError> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory transaction store");
            Ok(Arc::new(InMemoryTransactionStore::new()))
        }
        StoreBackend::Mongodb => {
            let mut client_options = ClientOptions::parse(config.store.url.expose_secret())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to parse MongoDB connection string: {}", e);
                    AppError::DatabaseError(e.into())
                })?;
            client_options.app_name = Some(config.service_name.clone());

            let client = Client::with_options(client_options).map_err(|e| {
                tracing::error!("Failed to create MongoDB client: {}", e);
                AppError::DatabaseError(e.into())
            })?;
            let store = MongoTransactionStore::new(&client.database(&config.store.db_name));

            store.init_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                AppError::DatabaseError(e)
            })?;

            Ok(Arc::new(store))
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let store = connect_store(&config).await?;
        let provider = PayOsClient::new(config.provider.clone());
        if config.provider.is_configured() {
            tracing::info!("payOS client initialized");
        } else {
            tracing::warn!("payOS credentials not configured - payment link creation will fail");
        }

        Self::build_with(config, store, Arc::new(provider), Arc::new(SystemClock)).await
    }

    /// Build around explicit collaborators.
    pub async fn build_with(
        config: Config,
        store: Arc<dyn TransactionStore>,
        provider: Arc<dyn PaymentProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        // Port 0 picks a random port for tests.
        let http_addr = (config.server.host.clone(), config.server.port);
        let http_listener = TcpListener::bind(&http_addr).await.map_err(|e| {
            tracing::error!(
                "Failed to bind HTTP listener to {}:{}: {}",
                http_addr.0,
                http_addr.1,
                e
            );
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Payment link service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state: AppState::new(config, store, provider, clock),
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Serve until the listener fails. Starts the background sweep when an
    /// interval is configured.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let interval = self.state.config.reconciliation.sweep_interval_secs;
        let background_sweep = (interval > 0).then(|| {
            tracing::info!(interval_secs = interval, "Background expiry sweep enabled");
            self.state
                .sweeper
                .clone()
                .spawn_interval(std::time::Duration::from_secs(interval))
        });

        let router = build_router(self.state);
        let result = axum::serve(self.http_listener, router).await;

        if let Some(handle) = background_sweep {
            handle.abort();
        }

        result.map_err(|e| {
            tracing::error!("HTTP server error: {}", e);
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
