use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

mod migrate;
mod record_repo;

const POOL_SIZE: u32 = 5;

/// Durable record store: saved auth state and per-user progress records,
/// one row per key in the `records` table.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// How the database behind a URL lives, which decides the pool shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backing {
    File,
    /// `sqlite::memory:`: every connection would get its own empty database.
    PrivateMemory,
    /// `mode=memory&cache=shared`: connections share one database that lives
    /// as long as any connection stays open.
    SharedMemory,
}

impl Backing {
    fn of(database_url: &str) -> Self {
        if database_url.contains("mode=memory") {
            Backing::SharedMemory
        } else if database_url.contains(":memory:") {
            Backing::PrivateMemory
        } else {
            Backing::File
        }
    }
}

impl SqliteRepository {
    /// Open the records database at `database_url`.
    ///
    /// File databases get a small pool in WAL mode. In-memory databases keep
    /// one connection open for the life of the pool so records survive
    /// between queries; a private `sqlite::memory:` database is limited to
    /// that single connection.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or the
    /// connection pragmas fail.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let backing = Backing::of(database_url);
        let pool_size = if backing == Backing::PrivateMemory {
            1
        } else {
            POOL_SIZE
        };
        let options = SqlitePoolOptions::new().max_connections(pool_size);
        let options = if backing == Backing::File {
            options
        } else {
            options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        };

        let pool = options
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    if backing == Backing::File {
                        sqlx::query("PRAGMA journal_mode = WAL;")
                            .execute(&mut *conn)
                            .await?;
                    }
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the `records` schema up to date. Safe to run on every start.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RecordStore;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[test]
    fn backing_follows_the_url() {
        assert_eq!(Backing::of("sqlite://pm_guide.sqlite3"), Backing::File);
        assert_eq!(Backing::of("sqlite::memory:"), Backing::PrivateMemory);
        assert_eq!(
            Backing::of("sqlite:file:memdb_x?mode=memory&cache=shared"),
            Backing::SharedMemory
        );
    }

    #[tokio::test]
    async fn private_memory_database_keeps_its_schema() {
        let repo = SqliteRepository::connect("sqlite::memory:").await.unwrap();
        repo.migrate().await.unwrap();

        for round in 0..3 {
            repo.put("pm_guide_token", &format!("t{round}")).await.unwrap();
        }
        assert_eq!(
            repo.get("pm_guide_token").await.unwrap().as_deref(),
            Some("t2")
        );
    }
}
