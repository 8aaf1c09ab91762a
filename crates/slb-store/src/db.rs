//! Embedded `SurrealDB` connection and schema migrations.
//!
//! On disk the database uses the `SurrealKV` engine
//! (`surrealkv://<path>`); tests use `mem://`. Migrations are ordered
//! SurrealQL batches; the applied version sits in `meta:schema` and
//! `open()` applies the missing suffix.

use std::path::Path;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use tracing::info;

use crate::error::StoreResult;

/// Ordered migration batches. Append only; never edit an applied batch.
const MIGRATIONS: &[&str] = &[
    // v1: base schema.
    r"
    DEFINE TABLE IF NOT EXISTS meta SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_meta_key ON TABLE meta COLUMNS key UNIQUE;

    DEFINE TABLE IF NOT EXISTS session SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_session_id ON TABLE session COLUMNS session_id UNIQUE;

    DEFINE TABLE IF NOT EXISTS request SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_request_id ON TABLE request COLUMNS request_id UNIQUE;
    DEFINE ANALYZER IF NOT EXISTS slb_text TOKENIZERS class FILTERS lowercase, ascii;
    DEFINE INDEX IF NOT EXISTS idx_request_command_search ON TABLE request COLUMNS command_raw SEARCH ANALYZER slb_text BM25;
    DEFINE INDEX IF NOT EXISTS idx_request_reason_search ON TABLE request COLUMNS reason SEARCH ANALYZER slb_text BM25;

    DEFINE TABLE IF NOT EXISTS review SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_review_id ON TABLE review COLUMNS review_id UNIQUE;
    DEFINE INDEX IF NOT EXISTS idx_review_pair ON TABLE review COLUMNS request_id, reviewer_session_id UNIQUE;

    DEFINE TABLE IF NOT EXISTS outcome SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_outcome_request ON TABLE outcome COLUMNS request_id UNIQUE;

    DEFINE TABLE IF NOT EXISTS audit SCHEMALESS;

    DEFINE TABLE IF NOT EXISTS removal_request SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_removal_id ON TABLE removal_request COLUMNS removal_id UNIQUE;
    ",
];

/// Connect to the on-disk database at `path` and apply migrations.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub(crate) async fn connect_embedded(path: &Path) -> StoreResult<Surreal<Any>> {
    let endpoint = format!("surrealkv://{}", path.display());
    let db: Surreal<Any> = Surreal::init();
    db.connect(&endpoint).await?;
    db.use_ns("slb").use_db("main").await?;
    migrate(&db).await?;
    Ok(db)
}

/// Connect to an in-memory database (for tests) and apply migrations.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub(crate) async fn connect_memory() -> StoreResult<Surreal<Any>> {
    let db: Surreal<Any> = Surreal::init();
    db.connect("mem://").await?;
    db.use_ns("slb").use_db("main").await?;
    migrate(&db).await?;
    Ok(db)
}

async fn migrate(db: &Surreal<Any>) -> StoreResult<()> {
    let applied = schema_version(db).await?;
    let target = MIGRATIONS.len();

    for (index, batch) in MIGRATIONS.iter().enumerate().skip(applied) {
        let version = index + 1;
        db.query(*batch).await?.check()?;
        db.query("UPSERT meta:schema CONTENT { key: 'schema_version', value: $version }")
            .bind(("version", version as i64))
            .await?
            .check()?;
        info!(version, "applied store migration");
    }

    if applied > target {
        // A newer binary wrote this database; refuse nothing, the schema is
        // append-only, but note it.
        tracing::warn!(applied, target, "store schema is newer than this binary");
    }
    Ok(())
}

async fn schema_version(db: &Surreal<Any>) -> StoreResult<usize> {
    #[derive(serde::Deserialize)]
    struct VersionRow {
        value: i64,
    }

    let mut res = db.query("SELECT value FROM meta:schema").await?;
    let rows: Vec<surrealdb::types::SerdeWrapper<VersionRow>> = res.take(0)?;
    Ok(rows
        .first()
        .map(|row| usize::try_from(row.0.value).unwrap_or(0))
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrate_memory() {
        let db = connect_memory().await.unwrap();
        assert_eq!(schema_version(&db).await.unwrap(), MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_migrate_idempotent() {
        let db = connect_memory().await.unwrap();
        migrate(&db).await.unwrap();
        migrate(&db).await.unwrap();
        assert_eq!(schema_version(&db).await.unwrap(), MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db = connect_embedded(&dir.path().join("slb.db")).await.unwrap();
        assert_eq!(schema_version(&db).await.unwrap(), MIGRATIONS.len());
    }
}
