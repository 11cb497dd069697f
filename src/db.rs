use sqlx::{postgres::PgPoolOptions, PgPool};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS raw_data (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL,
        source TEXT NOT NULL,
        payload JSONB NOT NULL,
        fetched_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS raw_data_email_idx ON raw_data (email)",
    r#"
    CREATE TABLE IF NOT EXISTS staging_normalized (
        email TEXT PRIMARY KEY,
        normalized_fields JSONB NOT NULL,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS finalize_data (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL,
        normalized_data JSONB NOT NULL,
        personalization_intro TEXT,
        personalization_cta TEXT,
        data_sources JSONB NOT NULL,
        record JSONB NOT NULL,
        resolved_at TIMESTAMPTZ NOT NULL,
        write_seq BIGSERIAL
    )
    "#,
    // Tables created before write ordering existed.
    "ALTER TABLE finalize_data ADD COLUMN IF NOT EXISTS write_seq BIGSERIAL",
    "DROP INDEX IF EXISTS finalize_data_email_idx",
    "CREATE INDEX IF NOT EXISTS finalize_data_email_seq_idx ON finalize_data (email, write_seq DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS company_news_cache (
        domain TEXT PRIMARY KEY,
        news JSONB NOT NULL,
        fetched_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Creates the enrichment tables when missing.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("✓ Database schema ready");
        Ok(())
    }
}
