use gar_server::config::Config;
use gar_server::notifications::TwilioNotifier;
use gar_server::orchestrator::{self, WorkerContext};
use gar_server::scoring::ScoreEngine;
use gar_server::storage::{GcsStore, ObjectStore};
use sea_orm::Database;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    gar_server::telemetry::init_telemetry("gar-worker");

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    let config = Config::from_env();

    // Metrics sidecar so the worker is scrapeable too
    let metrics_port = config.http.metrics_port;
    tokio::spawn(async move {
        let app = axum::Router::new()
            .route(
                "/metrics",
                axum::routing::get(|| async move { metric_handle.render() }),
            )
            .layer(prometheus_layer);
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], metrics_port));
        tracing::info!("Metrics server listening on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    let db = Database::connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    let redis_client =
        redis::Client::open(config.queue.redis_url.clone()).expect("Invalid Redis URL");

    let gcs_config = google_cloud_storage::client::ClientConfig::default()
        .with_auth()
        .await
        .expect("Failed to authenticate GCS client");
    let gcs_client = google_cloud_storage::client::Client::new(gcs_config);
    let store: Arc<dyn ObjectStore> = Arc::new(GcsStore::new(gcs_client, &config.storage));

    tracing::info!("Starting analysis workers...");

    let ctx = WorkerContext {
        db: Arc::new(db),
        redis_client: Arc::new(redis_client),
        store,
        engine: Arc::new(ScoreEngine::new()),
        notifier: Arc::new(TwilioNotifier::from_env()),
        analysis: config.analysis.clone(),
        queue: config.queue.clone(),
    };

    orchestrator::start_workers(ctx).await;

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down worker process"),
        Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
    }
}
