use axum::{
    routing::{get, post},
    Extension, Router,
};
use gar_server::config::Config;
use gar_server::storage::{GcsStore, ObjectStore};
use gar_server::{api, migrator};
use sea_orm::{Database, DatabaseConnection};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    gar_server::telemetry::init_telemetry("gar-server");

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    let config = Arc::new(Config::from_env());

    let db = Database::connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    let redis_client = Arc::new(
        redis::Client::open(config.queue.redis_url.clone()).expect("Invalid Redis URL"),
    );

    let gcs_config = google_cloud_storage::client::ClientConfig::default()
        .with_auth()
        .await
        .expect("Failed to authenticate GCS client");
    let gcs_client = google_cloud_storage::client::Client::new(gcs_config);
    let store: Arc<dyn ObjectStore> = Arc::new(GcsStore::new(gcs_client, &config.storage));

    use sea_orm_migration::MigratorTrait;
    migrator::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    gar_server::metrics::init_metrics(&db).await;

    let port = config.http.port;
    let app = app(db, redis_client, store, config, prometheus_layer, metric_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> &'static str {
    "OK"
}

fn app(
    db: DatabaseConnection,
    redis_client: Arc<redis::Client>,
    store: Arc<dyn ObjectStore>,
    config: Arc<Config>,
    prometheus_layer: axum_prometheus::PrometheusMetricLayer<'static>,
    metric_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Router {
    // Uploads carry multipart overhead on top of the video itself
    let body_limit = config.ingest.max_upload_bytes + 1024 * 1024;

    let auth_routes = Router::new()
        .route("/register", post(api::auth::register))
        .route("/login", post(api::auth::login));

    let protected_routes = Router::new()
        .route(
            "/videos",
            get(api::videos::list_videos).post(api::videos::upload_video),
        )
        .route("/videos/:id", get(api::videos::get_video))
        .route("/videos/:id/stream", get(api::videos::stream_video))
        .route("/videos/:id/cancel", post(api::videos::cancel_video))
        .route("/videos/:id/reanalyze", post(api::videos::reanalyze_video))
        .route_layer(axum::middleware::from_fn(api::middleware::auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes)
        .merge(protected_routes)
        .layer(Extension(db))
        .layer(Extension(redis_client))
        .layer(Extension(store))
        .layer(Extension(config.clone()))
        .layer(tower_cookies::CookieManagerLayer::new())
        .layer(prometheus_layer)
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<axum::body::Body>| {
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched| matched.as_str());

                    // Span name is "METHOD /path" so traces group per route
                    let span_name = if let Some(path) = matched_path {
                        format!("{} {}", request.method(), path)
                    } else {
                        format!("{} {}", request.method(), request.uri().path())
                    };

                    tracing::info_span!(
                        "request",
                        "otel.name" = span_name,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        // Filled in by handlers
                        user_id = tracing::field::Empty,
                        business_event = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency = tracing::field::Empty,
                    )
                })
                .on_request(
                    |_request: &axum::http::Request<axum::body::Body>, _span: &tracing::Span| {},
                )
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record("status", tracing::field::display(response.status()));
                        span.record("latency", tracing::field::debug(latency));
                        tracing::info!("request completed");
                    },
                ),
        )
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(
                    config
                        .http
                        .cors_origin
                        .parse::<axum::http::HeaderValue>()
                        .expect("CORS_ORIGIN must be a valid header value"),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PATCH,
                    axum::http::Method::DELETE,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .allow_credentials(true),
        )
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}
