//! `PostgreSQL` counter store for the sequence allocator.
//!
//! Implements [`TransactionalStore`] on top of a `sequence_counters` table, one row per
//! namespace. Every transaction runs at `SERIALIZABLE` isolation, so two transactions
//! that read and then write the same counter cannot both commit: the loser fails with
//! a serialization error, which is reported as [`StoreError::Conflict`] and retried by
//! the allocator.
//!
//! # Example
//!
//! ```ignore
//! use seqalloc_postgres::PostgresCounterStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresCounterStore::connect("postgres://localhost/seqalloc").await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use seqalloc_core::namespace::Namespace;
use seqalloc_core::store::{
    CounterDocument, StoreError, StoreFuture, StoreTransaction, TransactionalStore,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;

/// SQLSTATE codes that mean "another transaction got there first".
///
/// - `40001`: `serialization_failure`
/// - `40P01`: `deadlock_detected`
/// - `23505`: `unique_violation` (two transactions inserting the same new namespace)
const CONFLICT_SQLSTATES: [&str; 3] = ["40001", "40P01", "23505"];

/// Connection pool settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long to wait for a connection before giving up.
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// `PostgreSQL`-backed [`TransactionalStore`].
#[derive(Clone, Debug)]
pub struct PostgresCounterStore {
    pool: PgPool,
}

impl PostgresCounterStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with default [`PoolSettings`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        Self::connect_with(database_url, &PoolSettings::default()).await
    }

    /// Connect with explicit pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn connect_with(
        database_url: &str,
        settings: &PoolSettings,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = settings.max_connections,
            "Connected to PostgreSQL counter store"
        );

        Ok(Self::new(pool))
    }

    /// Create the `sequence_counters` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl TransactionalStore for PostgresCounterStore {
    fn begin(&self) -> StoreFuture<'_, Box<dyn StoreTransaction>> {
        Box::pin(async move {
            let mut txn = self
                .pool
                .begin()
                .await
                .map_err(|e| StoreError::Unavailable(format!("Failed to begin transaction: {e}")))?;

            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut *txn)
                .await
                .map_err(|e| StoreError::Unavailable(format!("Failed to set isolation: {e}")))?;

            Ok(Box::new(PostgresTransaction {
                txn,
                touched: None,
            }) as Box<dyn StoreTransaction>)
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Unavailable(format!("Ping failed: {e}")))?;
            Ok(())
        })
    }

    fn max_counter_value(&self) -> u64 {
        // current_value is a BIGINT
        i64::MAX.unsigned_abs()
    }
}

/// An open `SERIALIZABLE` transaction.
///
/// Dropping it without committing rolls it back.
pub struct PostgresTransaction {
    txn: Transaction<'static, Postgres>,
    touched: Option<Namespace>,
}

impl StoreTransaction for PostgresTransaction {
    fn read<'a>(
        &'a mut self,
        namespace: &'a Namespace,
    ) -> StoreFuture<'a, Option<CounterDocument>> {
        Box::pin(async move {
            self.touched = Some(namespace.clone());

            let row: Option<(i64,)> =
                sqlx::query_as("SELECT current_value FROM sequence_counters WHERE namespace = $1")
                    .bind(namespace.as_str())
                    .fetch_optional(&mut *self.txn)
                    .await
                    .map_err(|e| classify(namespace, &e))?;

            row.map(|(value,)| {
                u64::try_from(value)
                    .map(CounterDocument::new)
                    .map_err(|_| StoreError::InvalidDocument {
                        namespace: namespace.clone(),
                        reason: format!("negative current_value {value}"),
                    })
            })
            .transpose()
        })
    }

    fn write<'a>(
        &'a mut self,
        namespace: &'a Namespace,
        document: CounterDocument,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.touched = Some(namespace.clone());

            let value = i64::try_from(document.current_value).map_err(|_| {
                StoreError::InvalidDocument {
                    namespace: namespace.clone(),
                    reason: format!("current_value {} exceeds BIGINT", document.current_value),
                }
            })?;

            sqlx::query(
                r"
                INSERT INTO sequence_counters (namespace, current_value, updated_at)
                VALUES ($1, $2, now())
                ON CONFLICT (namespace) DO UPDATE
                SET current_value = EXCLUDED.current_value, updated_at = now()
                ",
            )
            .bind(namespace.as_str())
            .bind(value)
            .execute(&mut *self.txn)
            .await
            .map_err(|e| classify(namespace, &e))?;

            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        let Self { txn, touched } = *self;
        Box::pin(async move {
            txn.commit().await.map_err(|e| {
                let namespace = touched.unwrap_or_else(|| Namespace::new("<none>"));
                classify(&namespace, &e)
            })
        })
    }
}

/// Map a database error to a conflict when its SQLSTATE says the transaction lost a
/// race, and to `Unavailable` otherwise.
fn classify(namespace: &Namespace, error: &sqlx::Error) -> StoreError {
    if let Some(code) = sqlstate(error) {
        if CONFLICT_SQLSTATES.contains(&code.as_str()) {
            tracing::debug!(namespace = %namespace, sqlstate = %code, "Serialization conflict");
            metrics::counter!("seqalloc_postgres_serialization_failures_total", "sqlstate" => code)
                .increment(1);
            return StoreError::Conflict {
                namespace: namespace.clone(),
            };
        }
    }

    StoreError::Unavailable(error.to_string())
}

fn sqlstate(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}
