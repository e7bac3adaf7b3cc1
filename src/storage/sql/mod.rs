//! Unified SQL storage implementation.
//!
//! This module provides a shared implementation for SQL-based storage
//! backends (PostgreSQL, SQLite). The implementation is parameterized by
//! database type using the `SqlDatabase` trait.

mod publication_store;
mod query;


pub use publication_store::{SqlImportTx, SqlPublicationStore};
pub use query::SqlDatabase;

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    use sea_query::PostgresQueryBuilder;
    use sqlx::pool::PoolConnection;
    use sqlx::PgPool;

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Pool = PgPool;
        type Connection = PoolConnection<sqlx::Postgres>;

        const BEGIN: &'static str = "BEGIN";
        const ID_TYPE: &'static str = "BIGSERIAL PRIMARY KEY";
        const INT_TYPE: &'static str = "BIGINT";

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }
    }

    /// PostgreSQL publication store.
    pub type PostgresPublicationStore = super::SqlPublicationStore<Postgres>;
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.

    use std::str::FromStr;
    use std::time::Duration;

    use sea_query::SqliteQueryBuilder;
    use sqlx::pool::PoolConnection;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::SqlitePool;

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Pool = SqlitePool;
        type Connection = PoolConnection<sqlx::Sqlite>;

        // BEGIN IMMEDIATE acquires the write lock upfront, preventing deadlocks
        // when concurrent DEFERRED transactions race to upgrade from shared to exclusive.
        const BEGIN: &'static str = "BEGIN IMMEDIATE";
        const ID_TYPE: &'static str = "INTEGER PRIMARY KEY AUTOINCREMENT";
        const INT_TYPE: &'static str = "INTEGER";

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }
    }

    /// SQLite publication store.
    pub type SqlitePublicationStore = super::SqlPublicationStore<Sqlite>;

    /// Open a SQLite pool, creating the database file if needed.
    ///
    /// Each connection to `sqlite::memory:` gets its own database, so
    /// in-memory URLs only make sense with `max_connections = 1`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(30));

        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await
    }
}
