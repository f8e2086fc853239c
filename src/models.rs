use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============ Database Models ============

/// Administrative region used as the grouping key for trips and metrics.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Municipio {
    /// Unique identifier.
    pub id: i32,
    /// IBGE-style municipality code, unique.
    pub codigo: String,
    /// Display name.
    pub nome: String,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

/// One transportation event ingested into the store.
///
/// Created by the sync service or the import endpoint; immutable after
/// creation except for corrective re-sync (upsert by `external_id`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Corrida {
    /// Unique identifier.
    pub id: Uuid,
    /// Identifier from the source system, unique. Re-imports upsert on it.
    pub external_id: String,
    /// Foreign key to the `municipios` table.
    pub municipio_id: i32,
    /// Origin reference (stop, neighborhood or free text from the source).
    pub origem: String,
    /// Destination reference.
    pub destino: String,
    /// When the trip started.
    pub started_at: DateTime<Utc>,
    /// Distance travelled, in kilometers.
    pub distancia_km: f64,
    /// Fare charged.
    pub valor: BigDecimal,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Timestamp of last update.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Daily metric aggregate, derived from trips for one date+municipality.
///
/// Recomputed idempotently by the sync service; read by the dashboard API.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MetricaDiaria {
    /// Unique identifier.
    pub id: i32,
    /// The aggregated day.
    pub dia: NaiveDate,
    /// Foreign key to the `municipios` table.
    pub municipio_id: i32,
    /// Trip count for the day.
    pub total_corridas: i64,
    /// Total fare for the day.
    pub valor_total: BigDecimal,
    /// Total distance for the day, in kilometers.
    pub distancia_total_km: f64,
    /// Timestamp of last recomputation.
    pub updated_at: Option<DateTime<Utc>>,
}

// ============ Dashboard API Models ============

/// Store-wide totals for `GET /api/dashboard/overview`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DashboardOverview {
    /// Total trips stored.
    pub total_corridas: i64,
    /// Total revenue over all trips.
    pub valor_total: BigDecimal,
    /// Total distance over all trips, in kilometers.
    pub distancia_total_km: f64,
    /// Number of municipalities with at least one trip.
    pub total_municipios: i64,
    /// Earliest trip day, if any trips exist.
    pub primeiro_dia: Option<NaiveDate>,
    /// Latest trip day, if any trips exist.
    pub ultimo_dia: Option<NaiveDate>,
}

/// Per-municipality listing row for `GET /api/dashboard/municipios`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MunicipioResumo {
    pub id: i32,
    pub codigo: String,
    pub nome: String,
    /// Trips recorded for this municipality.
    pub total_corridas: i64,
    /// Revenue recorded for this municipality.
    pub valor_total: BigDecimal,
}

/// Query parameters for the daily metric series.
#[derive(Debug, Deserialize)]
pub struct MetricasDiariasQuery {
    /// Inclusive start of the date range.
    pub inicio: Option<NaiveDate>,
    /// Inclusive end of the date range.
    pub fim: Option<NaiveDate>,
    /// Municipality code filter.
    pub municipio: Option<String>,
}

/// One row of the daily metric series, joined with the municipality name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MetricaDiariaRow {
    pub dia: NaiveDate,
    pub codigo: String,
    pub municipio: String,
    pub total_corridas: i64,
    pub valor_total: BigDecimal,
    pub distancia_total_km: f64,
}

/// KPI summary for `GET /api/metrics/kpis`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct KpiSummary {
    pub total_corridas: i64,
    pub valor_total: BigDecimal,
    /// Average fare over all trips.
    pub ticket_medio: Option<BigDecimal>,
    /// Average distance over all trips, in kilometers.
    pub distancia_media_km: Option<f64>,
    /// Municipality with the most trips.
    pub municipio_destaque: Option<String>,
    /// Day with the most trips.
    pub dia_pico: Option<NaiveDate>,
}

// ============ Import API Models ============

/// One rejected row in an import batch.
#[derive(Debug, Clone, Serialize)]
pub struct RowFailure {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub error: String,
}

/// Per-row accounting returned by `POST /api/import/upload`.
///
/// A bad row never aborts the batch; it is skipped and reported here.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub failures: Vec<RowFailure>,
}

// ============ Sync API Models ============

/// Request body for `POST /api/sync/execute`.
#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    /// Re-sync even when the store already has trips.
    #[serde(default)]
    pub force: bool,
}
