use crate::errors::{AppError, ResultExt};
use crate::import_schema::TripRow;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

/// Database storage service for trip records and derived daily metrics.
///
/// All writes go through upserts keyed on external identifiers, so re-applying
/// the same batch leaves the store unchanged.
pub struct TripStorage {
    pool: PgPool,
}

impl TripStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of trip records currently stored.
    pub async fn count_corridas(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM corridas")
            .fetch_one(&self.pool)
            .await
            .context("Counting stored trips")?;
        Ok(count)
    }

    /// Insert-or-update a municipality by code, returning its id.
    pub async fn upsert_municipio(
        tx: &mut Transaction<'_, Postgres>,
        codigo: &str,
        nome: &str,
    ) -> Result<i32, AppError> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO municipios (codigo, nome) VALUES ($1, $2)
             ON CONFLICT (codigo) DO UPDATE SET nome = EXCLUDED.nome
             RETURNING id",
        )
        .bind(codigo)
        .bind(nome)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Insert-or-update one trip record by its external id.
    pub async fn upsert_corrida(
        tx: &mut Transaction<'_, Postgres>,
        row: &TripRow,
        municipio_id: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO corridas
                (id, external_id, municipio_id, origem, destino, started_at, distancia_km, valor)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (external_id) DO UPDATE SET
                municipio_id = EXCLUDED.municipio_id,
                origem = EXCLUDED.origem,
                destino = EXCLUDED.destino,
                started_at = EXCLUDED.started_at,
                distancia_km = EXCLUDED.distancia_km,
                valor = EXCLUDED.valor,
                updated_at = now()",
        )
        .bind(Uuid::new_v4())
        .bind(&row.external_id)
        .bind(municipio_id)
        .bind(&row.origem)
        .bind(&row.destino)
        .bind(row.started_at)
        .bind(row.distancia_km)
        .bind(&row.valor)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Recompute the daily metric aggregates from the trips table.
    ///
    /// Metrics are a deterministic aggregation of the stored trips for each
    /// date+municipality pair, so recomputation is idempotent and never
    /// double-counts a re-synced batch.
    pub async fn recompute_metricas(tx: &mut Transaction<'_, Postgres>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "INSERT INTO metricas_diarias
                (dia, municipio_id, total_corridas, valor_total, distancia_total_km, updated_at)
             SELECT
                (started_at AT TIME ZONE 'UTC')::date,
                municipio_id,
                COUNT(*),
                COALESCE(SUM(valor), 0),
                COALESCE(SUM(distancia_km), 0),
                now()
             FROM corridas
             GROUP BY (started_at AT TIME ZONE 'UTC')::date, municipio_id
             ON CONFLICT (dia, municipio_id) DO UPDATE SET
                total_corridas = EXCLUDED.total_corridas,
                valor_total = EXCLUDED.valor_total,
                distancia_total_km = EXCLUDED.distancia_total_km,
                updated_at = now()",
        )
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Apply a whole batch in a single transaction: upsert municipalities and
    /// trips, then recompute the metrics. Any failure rolls everything back.
    pub async fn apply_batch(&self, rows: &[TripRow]) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut municipio_ids: HashMap<String, i32> = HashMap::new();
        for row in rows {
            let municipio_id = match municipio_ids.get(&row.municipio_codigo) {
                Some(id) => *id,
                None => {
                    let id =
                        Self::upsert_municipio(&mut tx, &row.municipio_codigo, &row.municipio_nome)
                            .await?;
                    municipio_ids.insert(row.municipio_codigo.clone(), id);
                    id
                }
            };
            Self::upsert_corrida(&mut tx, row, municipio_id).await?;
        }

        Self::recompute_metricas(&mut tx).await?;
        tx.commit().await.context("Committing sync batch")?;

        Ok(rows.len())
    }

    /// Upsert one row in its own transaction. Used by the import endpoint,
    /// where a failing row must not take the rest of the batch down with it.
    pub async fn upsert_single(&self, row: &TripRow) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let municipio_id =
            Self::upsert_municipio(&mut tx, &row.municipio_codigo, &row.municipio_nome).await?;
        Self::upsert_corrida(&mut tx, row, municipio_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Recompute metrics in a standalone transaction, for use after a
    /// row-by-row import pass.
    pub async fn recompute_metricas_standalone(&self) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let rows = Self::recompute_metricas(&mut tx).await?;
        tx.commit().await?;
        Ok(rows)
    }
}
