use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mobility_dashboard_api::config::Config;
use mobility_dashboard_api::db::Database;
use mobility_dashboard_api::handlers::{self, AppState};
use mobility_dashboard_api::import_handler;
use mobility_dashboard_api::sync::SyncService;

/// Serves the OpenAPI specification YAML file.
///
/// Reads `openapi.yml` from the filesystem and serves it with the
/// appropriate content type; 404 when the file is missing.
async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found").into_response(),
    }
}

/// Serves the Swagger UI HTML page, configured to load the OpenAPI
/// specification served by `serve_openapi_spec`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Mobility Dashboard API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Main entry point for the application.
///
/// Initializes logging, configuration and the database (including schema
/// bootstrap), runs an initial sync when the store is empty, then starts the
/// Axum server with the dashboard, import and sync routes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mobility_dashboard_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool and bootstrap the schema
    let db = Database::new(&config.database_url, config.profile.max_connections()).await?;
    db.ensure_schema().await?;
    tracing::info!("Database connection pool established");

    // Initial sync: populates an empty store, no-op otherwise. A degraded or
    // failed sync is logged but never blocks startup.
    let sync_service = SyncService::new(&config, db.pool.clone());
    match sync_service.sync_all_data(false).await {
        Ok(report) if report.success => {
            tracing::info!("Initial sync complete ({:?})", report.mode);
        }
        Ok(report) => {
            tracing::warn!(
                "Initial sync finished with problems: {}",
                report.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        Err(e) => {
            tracing::warn!("Initial sync errored: {}", e);
        }
    }

    // Build application state
    let app_state = Arc::new(AppState {
        db: db.pool.clone(),
        config: config.clone(),
    });

    // CORS: explicit origin/method/header allowlist
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = Router::new()
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        // Health
        .route("/api/health", get(handlers::health))
        // Dashboard endpoints
        .route("/api/dashboard/overview", get(handlers::dashboard_overview))
        .route("/api/dashboard/municipios", get(handlers::list_municipios))
        .route(
            "/api/dashboard/metricas-diarias",
            get(handlers::metricas_diarias),
        )
        .route("/api/metrics/kpis", get(handlers::kpis))
        // Import and sync endpoints
        .route("/api/import/upload", post(import_handler::upload))
        .route("/api/sync/execute", post(handlers::sync_execute))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload; axum's built-in 2MB
                // default would otherwise cap uploads below the layer limit
                .layer(DefaultBodyLimit::max(5 * 1024 * 1024))
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024)),
        )
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
