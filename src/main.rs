mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::Config;
use db::db::DBClient;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};

use service::{
    background_jobs::{start_payment_reconciliation_job, start_pool_monitor},
    cloudinary::CloudinaryService,
    firebase_auth::FirebaseAuth,
    job_service::JobService,
    notification_service::NotificationService,
    payment_provider::PaymentProviderService,
    payment_service::PaymentService,
    review_service::ReviewService,
};

const OUTBOUND_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    pub firebase_auth: Arc<FirebaseAuth>,
    pub cloudinary: Arc<CloudinaryService>,
    // Services
    pub job_service: Arc<JobService>,
    pub payment_service: Arc<PaymentService>,
    pub review_service: Arc<ReviewService>,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config, http: reqwest::Client) -> Self {
        let db_client = Arc::new(db_client);

        let firebase_auth = Arc::new(FirebaseAuth::new(
            config.firebase_project_id.clone(),
            http.clone(),
        ));
        let cloudinary = Arc::new(CloudinaryService::new(&config, http.clone()));
        let payment_provider = Arc::new(PaymentProviderService::new(&config, http));

        let notification_service = Arc::new(NotificationService::new(db_client.clone()));
        let job_service = Arc::new(JobService::new(
            db_client.clone(),
            notification_service.clone(),
        ));
        let payment_service = Arc::new(PaymentService::new(
            db_client.clone(),
            payment_provider,
            notification_service.clone(),
            config.stripe_webhook_secret.clone(),
        ));
        let review_service = Arc::new(ReviewService::new(
            db_client.clone(),
            notification_service.clone(),
        ));

        Self {
            env: config,
            db_client,
            firebase_auth,
            cloudinary,
            job_service,
            payment_service,
            review_service,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State over a pool that never connects unless a query runs, with every
    /// optional integration left unconfigured.
    pub fn for_tests() -> Arc<Self> {
        let env = std::collections::HashMap::from([
            ("DATABASE_URL", "postgres://localhost/servicehub_test"),
            ("FIREBASE_PROJECT_ID", "servicehub-test"),
        ]);
        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();

        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();

        Arc::new(AppState::new(DBClient::new(pool), config, reqwest::Client::new()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::init()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;

    tracing::info!(
        "Connected to the database (max {} connections)",
        config.database_max_connections
    );

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database migrations are up to date");
    }

    let http = reqwest::Client::builder()
        .timeout(OUTBOUND_HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    tracing::info!(
        "Stripe: {}, Khalti: {}, Cloudinary: {}",
        enabled(config.stripe_enabled()),
        enabled(config.khalti_enabled()),
        enabled(config.cloudinary_enabled())
    );

    let allowed_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH]);

    let app_state = Arc::new(AppState::new(DBClient::new(pool), config.clone(), http));

    let app = create_router(app_state.clone()).layer(cors);

    // Start background jobs
    tokio::spawn(start_payment_reconciliation_job(app_state.clone()));
    tokio::spawn(start_pool_monitor(app_state.clone()));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;

    tracing::info!("Server is running on http://localhost:{}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "not configured"
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received, finishing in-flight requests");
}
