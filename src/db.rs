use sqlx::{postgres::PgPoolOptions, PgPool};

/// Relational schema, applied on startup. Statements are create-if-absent so
/// re-running against an existing store is harmless.
const SCHEMA_SQL: &str = include_str!("../schema.sql");

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Bootstrap the schema from the bundled SQL script.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        tracing::info!("Database schema ensured");
        Ok(())
    }
}
