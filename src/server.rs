//! Reusable booking service runtime.
//!
//! Provides [`ServerHandle`] that encapsulates the full server lifecycle:
//! storage init, migrations, payment gateway, REST API, the pending
//! payment expiry task, metrics, and graceful shutdown.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use crate::application::{
    start_payment_expiry_task, BookingService, ExpirySettings, NotificationFeed, PaymentExpiry,
    PaymentReconciler, SettlementService, SlotGrid,
};
use crate::config::{AppConfig, LogFormat};
use crate::domain::{RepositoryProvider, StationCatalog};
use crate::infrastructure::{
    build_gateway, init_database, run_migrations, DatabaseConfig, InMemoryRepositoryProvider,
    SeaOrmRepositoryProvider, StaticStationCatalog,
};
use crate::interfaces::http::modules::health::HealthState;
use crate::interfaces::http::modules::metrics::MetricsState;
use crate::interfaces::http::{create_api_router, ApiState};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::shared::time::system_clock;

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the booking service.
pub struct ServerOptions {
    /// Application configuration.
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running booking service.
///
/// # Examples
///
/// ```rust,no_run
/// use evbook::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     // ... wait for shutdown signal ...
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// Repository provider for data access.
    pub repos: Arc<dyn RepositoryProvider>,
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// API port the server is listening on.
    pub api_port: u16,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    api_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Start the booking service with the given options.
    ///
    /// This will:
    /// 1. Install the Prometheus metrics recorder
    /// 2. Open storage (SQL with migrations, or in-memory)
    /// 3. Build the payment gateway and station catalog
    /// 4. Start the pending payment expiry task
    /// 5. Start the REST API server (with Swagger UI)
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting EV booking service...");

        let metrics = install_metrics_recorder().map(|handle| MetricsState { handle });

        // ── Storage ────────────────────────────────────────────
        let (repos, db): (Arc<dyn RepositoryProvider>, Option<DatabaseConnection>) =
            if app_cfg.database.is_memory() {
                warn!("Using in-memory storage; bookings are lost on restart");
                (Arc::new(InMemoryRepositoryProvider::new()), None)
            } else {
                let db_config = DatabaseConfig {
                    url: app_cfg.database.url.clone(),
                };
                let db = init_database(&db_config).await?;
                if opts.auto_migrate {
                    run_migrations(&db).await?;
                }
                (Arc::new(SeaOrmRepositoryProvider::new(db.clone())), Some(db))
            };

        // ── Catalog, gateway & services ────────────────────────
        let catalog = StaticStationCatalog::from_config(&app_cfg.stations);
        if catalog.is_empty() {
            warn!("No stations configured; every booking will be rejected");
        } else {
            info!(stations = catalog.len(), "Station catalog loaded");
        }
        let catalog: Arc<dyn StationCatalog> = Arc::new(catalog);

        let gateway = build_gateway(&app_cfg.payment)?;
        let gateway_name = gateway.name();
        info!(gateway = gateway_name, "Payment gateway ready");

        let clock = system_clock();
        let grid = Arc::new(SlotGrid::new(
            repos.clone(),
            catalog.clone(),
            app_cfg.booking.grid_settings(),
            clock.clone(),
        ));
        let bookings = Arc::new(BookingService::new(
            repos.clone(),
            grid.clone(),
            catalog,
            clock.clone(),
        ));
        let settlement = Arc::new(SettlementService::new(repos.clone(), clock.clone()));
        let payments = Arc::new(PaymentReconciler::new(
            repos.clone(),
            gateway,
            clock.clone(),
            Duration::from_secs(app_cfg.payment.timeout_secs),
        ));
        let feed = Arc::new(NotificationFeed::new(repos.clone(), clock.clone()));

        // ── Shutdown coordinator ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // ── Background tasks ───────────────────────────────────
        let expiry = Arc::new(PaymentExpiry::new(
            repos.clone(),
            bookings.clone(),
            payments.clone(),
            clock,
            ExpirySettings {
                ttl: chrono::Duration::minutes(app_cfg.booking.pending_payment_ttl_minutes),
                check_interval_secs: app_cfg.booking.expiry_check_interval_secs,
            },
        ));
        start_payment_expiry_task(expiry, shutdown_signal.clone());

        // ── REST API server ────────────────────────────────────
        let api_router = create_api_router(
            ApiState {
                grid,
                bookings,
                settlement,
                payments,
                feed,
                recent_window: chrono::Duration::minutes(app_cfg.payment.recent_window_minutes),
            },
            HealthState {
                db: db.clone(),
                gateway: gateway_name,
                started_at: Arc::new(Instant::now()),
            },
            metrics,
        );

        let api_port = app_cfg.server.api_port;
        let api_addr = format!("{}:{}", app_cfg.server.api_host, api_port);
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        info!("REST API server listening on http://{}", api_addr);
        info!("Swagger UI available at http://{}/swagger-ui/", api_addr);

        let api_shutdown = shutdown_signal.clone();
        let api_server = axum::serve(listener, api_router).with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        Ok(Self {
            repos,
            config: app_cfg,
            api_port,
            db,
            shutdown,
            api_task,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to fully stop after shutdown has been triggered.
    pub async fn wait(self) {
        info!("Waiting for server tasks to complete...");

        let timeout = Duration::from_secs(self.shutdown.timeout_secs());
        match tokio::time::timeout(timeout, self.api_task).await {
            Ok(Ok(())) => info!("REST API server stopped"),
            Ok(Err(e)) => error!("REST API server task panicked: {}", e),
            Err(_) => warn!("REST API server did not stop within {:?}", timeout),
        }

        if let Some(db) = self.db {
            if let Err(e) = db.close().await {
                warn!("Error closing database connection: {}", e);
            } else {
                info!("Database connection closed");
            }
        }

        info!("EV booking service shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("Shutting down EV booking service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    /// Check if the server is still running.
    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// The global recorder can only be installed once per process; a restart
/// within the same process reuses it.
fn install_metrics_recorder() -> Option<PrometheusHandle> {
    static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

    PROM_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("Prometheus metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                warn!("Metrics disabled, recorder install failed: {}", e);
                None
            }
        })
        .clone()
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup (before [`ServerHandle::start`]).
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_and_stops_on_memory_storage() {
        let mut config = AppConfig::default();
        config.database.url = "memory".to_string();
        config.server.api_host = "127.0.0.1".to_string();
        config.server.api_port = 0;
        config.server.shutdown_timeout = 5;

        let handle = ServerHandle::start(ServerOptions {
            config,
            auto_migrate: true,
        })
        .await
        .unwrap();
        assert!(handle.is_running());
        handle.shutdown().await;
    }
}
