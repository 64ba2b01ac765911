//! SQLite pool factory and migration runner.

use std::str::FromStr;

use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use bookshelf_kernel::{settings::DatabaseSettings, Migration};

const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    module     TEXT NOT NULL,
    id         TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (module, id)
)";

/// Open a connection pool for the configured database.
///
/// In-memory databases live as long as their connection, so they get a single
/// connection that is never recycled.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&settings.url)
        .with_context(|| format!("invalid database url '{}'", settings.url))?
        .foreign_keys(true);

    let pool_options = if settings.is_in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(settings.max_connections)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to '{}'", settings.url))?;

    tracing::info!(target: "bookshelf-db", url = %settings.url, "database pool ready");
    Ok(pool)
}

/// Apply module migrations that have not run yet, each in its own transaction.
///
/// Returns the number of migrations applied by this call.
pub async fn run_migrations(
    pool: &SqlitePool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<usize> {
    sqlx::query(MIGRATIONS_TABLE)
        .execute(pool)
        .await
        .context("failed to create migrations table")?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let already: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM _migrations WHERE module = ? AND id = ?")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(pool)
                .await
                .context("failed to read migrations table")?;
        if already.is_some() {
            tracing::debug!(target: "bookshelf-db", %module, id = migration.id, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await.context("failed to open transaction")?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {}/{} failed", module, migration.id))?;
        sqlx::query("INSERT INTO _migrations (module, id) VALUES (?, ?)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .context("failed to record migration")?;
        tx.commit().await.context("failed to commit migration")?;

        tracing::info!(target: "bookshelf-db", %module, id = migration.id, "applied migration");
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> DatabaseSettings {
        DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        }
    }

    fn migrations() -> Vec<(String, Migration)> {
        vec![(
            "widgets".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE widget (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
                     INSERT INTO widget (name) VALUES ('first');",
            },
        )]
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let pool = connect(&memory()).await.unwrap();

        assert_eq!(run_migrations(&pool, &migrations()).await.unwrap(), 1);
        assert_eq!(run_migrations(&pool, &migrations()).await.unwrap(), 0);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM widget")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let pool = connect(&memory()).await.unwrap();
        let broken = vec![(
            "broken".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE nope (",
            },
        )];

        assert!(run_migrations(&pool, &broken).await.is_err());

        let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(recorded, 0);
    }
}
