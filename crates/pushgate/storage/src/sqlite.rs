//! SQLite storage implementation.

use std::collections::HashMap;

use color_eyre::eyre::WrapErr as _;
use diesel::connection::SimpleConnection as _;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;

use crate::models::*;
use crate::schema::*;
use crate::traits::*;

type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

/// Applied to every pooled connection so concurrent writers wait instead of failing.
#[derive(Debug)]
struct ConnectionPragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionPragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// SQLite-based storage.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage from a database URL.
    pub fn new(database_url: &str) -> color_eyre::eyre::Result<Self> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(10)
            .connection_customizer(Box::new(ConnectionPragmas))
            .build(manager)
            .wrap_err("failed to create connection pool")?;

        Ok(Self { pool })
    }

    /// Run migrations.
    pub fn run_migrations(&self) -> color_eyre::eyre::Result<()> {
        use diesel_migrations::MigrationHarness as _;

        let mut conn = self
            .pool
            .get()
            .wrap_err("failed to get connection for migrations")?;

        conn.run_pending_migrations(crate::MIGRATIONS)
            .map_err(|e| color_eyre::eyre::eyre!("migration failed: {}", e))?;

        Ok(())
    }

    /// Run a blocking query on the pool without stalling the async runtime.
    async fn with_conn<T, F>(&self, f: F) -> color_eyre::eyre::Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> color_eyre::eyre::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().wrap_err("failed to get database connection")?;
            f(&mut *conn)
        })
        .await
        .wrap_err("database task failed")?
    }
}

impl CanonicalIdStore for SqliteStorage {
    async fn resolve(&self, reg_id: &str) -> color_eyre::eyre::Result<String> {
        let reg_id = reg_id.to_string();

        self.with_conn(move |conn| {
            let canonical: Option<String> = canonical_reg_ids::table
                .filter(canonical_reg_ids::reg_id.eq(&reg_id))
                .select(canonical_reg_ids::canonical_reg_id)
                .first(conn)
                .optional()
                .wrap_err("failed to get canonical reg ID")?;

            Ok(canonical.unwrap_or(reg_id))
        })
        .await
    }

    async fn resolve_batch(
        &self,
        reg_ids: &[String],
    ) -> color_eyre::eyre::Result<HashMap<String, String>> {
        let mut unique = reg_ids.to_vec();
        unique.sort();
        unique.dedup();

        self.with_conn(move |conn| {
            let rows: Vec<CanonicalRegIdRow> = canonical_reg_ids::table
                .filter(canonical_reg_ids::reg_id.eq_any(&unique))
                .select(CanonicalRegIdRow::as_select())
                .load(conn)
                .wrap_err("failed to get canonical reg IDs")?;

            let mut mappings: HashMap<String, String> = rows
                .into_iter()
                .map(|row| (row.reg_id, row.canonical_reg_id))
                .collect();

            for reg_id in unique {
                mappings.entry(reg_id.clone()).or_insert(reg_id);
            }

            Ok(mappings)
        })
        .await
    }

    async fn record_canonical(
        &self,
        reg_id: &str,
        canonical_reg_id: &str,
    ) -> color_eyre::eyre::Result<()> {
        let reg_id = reg_id.to_string();
        let canonical_reg_id = canonical_reg_id.to_string();

        self.with_conn(move |conn| {
            let row = NewCanonicalRegId {
                reg_id: &reg_id,
                canonical_reg_id: &canonical_reg_id,
            };

            diesel::insert_into(canonical_reg_ids::table)
                .values(&row)
                .on_conflict(canonical_reg_ids::reg_id)
                .do_update()
                .set(canonical_reg_ids::canonical_reg_id.eq(&canonical_reg_id))
                .execute(conn)
                .wrap_err("failed to store canonical reg ID")?;

            tracing::debug!("stored canonical reg ID");
            Ok(())
        })
        .await
    }
}
