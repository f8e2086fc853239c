use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::sync::{SyncReport, SyncService};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state injected into handlers.
///
/// Constructed once in `main` and passed through axum's `State` extractor;
/// there is no ambient global for the pool or the configuration.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
}

/// GET /api/health
///
/// Runs a liveness query against the store. Reports `healthy` with 200 when
/// the store answers, `unhealthy` with 503 when it does not.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "mobility-dashboard-api",
                "version": "0.1.0"
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// GET /api/dashboard/overview
///
/// Store-wide totals: trip count, revenue, distance, municipality count and
/// the covered date span. Recomputed from the store on every request.
pub async fn dashboard_overview(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardOverview>, AppError> {
    tracing::info!("GET /api/dashboard/overview");

    let overview = sqlx::query_as::<_, DashboardOverview>(
        "SELECT
            COUNT(*) AS total_corridas,
            COALESCE(SUM(valor), 0) AS valor_total,
            COALESCE(SUM(distancia_km), 0)::double precision AS distancia_total_km,
            COUNT(DISTINCT municipio_id) AS total_municipios,
            MIN((started_at AT TIME ZONE 'UTC')::date) AS primeiro_dia,
            MAX((started_at AT TIME ZONE 'UTC')::date) AS ultimo_dia
         FROM corridas",
    )
    .fetch_one(&state.db)
    .await?;

    Ok(Json(overview))
}

/// GET /api/dashboard/municipios
///
/// Municipality listing with per-municipality trip counts and revenue.
pub async fn list_municipios(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MunicipioResumo>>, AppError> {
    tracing::info!("GET /api/dashboard/municipios");

    let municipios = sqlx::query_as::<_, MunicipioResumo>(
        "SELECT m.id, m.codigo, m.nome,
                COUNT(c.id) AS total_corridas,
                COALESCE(SUM(c.valor), 0) AS valor_total
         FROM municipios m
         LEFT JOIN corridas c ON c.municipio_id = m.id
         GROUP BY m.id, m.codigo, m.nome
         ORDER BY total_corridas DESC, m.nome ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(municipios))
}

/// GET /api/dashboard/metricas-diarias
///
/// Daily metric series, optionally filtered by date range and municipality
/// code. Reads the derived `metricas_diarias` table.
pub async fn metricas_diarias(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MetricasDiariasQuery>,
) -> Result<Json<Vec<MetricaDiariaRow>>, AppError> {
    tracing::info!("GET /api/dashboard/metricas-diarias - params: {:?}", params);

    if let (Some(inicio), Some(fim)) = (params.inicio, params.fim) {
        if inicio > fim {
            return Err(AppError::BadRequest(
                "'inicio' must not be after 'fim'".to_string(),
            ));
        }
    }

    let series = sqlx::query_as::<_, MetricaDiariaRow>(
        "SELECT md.dia, m.codigo, m.nome AS municipio,
                md.total_corridas, md.valor_total, md.distancia_total_km
         FROM metricas_diarias md
         JOIN municipios m ON m.id = md.municipio_id
         WHERE ($1::date IS NULL OR md.dia >= $1)
           AND ($2::date IS NULL OR md.dia <= $2)
           AND ($3::text IS NULL OR m.codigo = $3)
         ORDER BY md.dia ASC, m.codigo ASC",
    )
    .bind(params.inicio)
    .bind(params.fim)
    .bind(params.municipio)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(series))
}

/// GET /api/metrics/kpis
///
/// KPI summary: totals, averages, busiest municipality and peak day.
pub async fn kpis(State(state): State<Arc<AppState>>) -> Result<Json<KpiSummary>, AppError> {
    tracing::info!("GET /api/metrics/kpis");

    let summary = sqlx::query_as::<_, KpiSummary>(
        "SELECT
            (SELECT COUNT(*) FROM corridas) AS total_corridas,
            (SELECT COALESCE(SUM(valor), 0) FROM corridas) AS valor_total,
            (SELECT AVG(valor) FROM corridas) AS ticket_medio,
            (SELECT AVG(distancia_km) FROM corridas) AS distancia_media_km,
            (SELECT m.nome
               FROM municipios m
               JOIN corridas c ON c.municipio_id = m.id
              GROUP BY m.nome
              ORDER BY COUNT(*) DESC, m.nome ASC
              LIMIT 1) AS municipio_destaque,
            (SELECT (started_at AT TIME ZONE 'UTC')::date AS dia
               FROM corridas
              GROUP BY dia
              ORDER BY COUNT(*) DESC, dia ASC
              LIMIT 1) AS dia_pico",
    )
    .fetch_one(&state.db)
    .await?;

    Ok(Json(summary))
}

/// POST /api/sync/execute
///
/// Triggers the sync service. The optional body carries `force`; without it
/// a sync only runs against an empty store. Callers are expected to
/// serialize invocations; no locking is done here.
pub async fn sync_execute(
    State(state): State<Arc<AppState>>,
    body: Option<Json<SyncRequest>>,
) -> Result<Json<SyncReport>, AppError> {
    let force = body.map(|Json(b)| b.force).unwrap_or(false);
    tracing::info!("POST /api/sync/execute - force: {}", force);

    let sync_service = SyncService::new(&state.config, state.db.clone());
    let report = sync_service.sync_all_data(force).await?;

    tracing::info!(
        "Sync finished. success: {}, mode: {:?}",
        report.success,
        report.mode
    );

    Ok(Json(report))
}
