//! SQL database abstraction trait.

/// Trait for SQL database backends.
///
/// This trait abstracts over different SQL databases (PostgreSQL, SQLite)
/// by providing the pool and connection types, the dialect details the
/// store needs, and query building methods.
pub trait SqlDatabase: Send + Sync + 'static {
    /// The connection pool type for this database.
    type Pool: Clone + Send + Sync;

    /// A connection checked out of the pool.
    type Connection: Send;

    /// Statement that opens a write transaction.
    const BEGIN: &'static str;

    /// Auto-increment primary key declaration.
    const ID_TYPE: &'static str;

    /// 64-bit integer column type.
    const INT_TYPE: &'static str;

    /// Build a SQL query string from a sea-query SELECT statement.
    fn build_select(stmt: sea_query::SelectStatement) -> String;

    /// Build a SQL query string from a sea-query INSERT statement.
    fn build_insert(stmt: sea_query::InsertStatement) -> String;
}
