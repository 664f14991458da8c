use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Sqlite, SqlitePool,
};
use std::{fmt::Display, marker::PhantomData, str::FromStr, time};

#[macro_use]
extern crate log;

mod user;

pub use user::*;

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Typed handle over a connection pool. `T` is the row type the handle
/// reads and writes, the queries live in `impl Database<T>` blocks next to
/// each row type.
pub struct Database<T> {
    addr: String,
    pool: SqlitePool,
    _phantom: PhantomData<T>,
}

impl<T> Database<T> {
    /// Connects to the database at `addr`, creating the file if it is missing.
    pub async fn new(addr: &str, max_connections: u32) -> DatabaseResult<Self> {
        let timer = time::Instant::now();
        let options = SqliteConnectOptions::from_str(addr)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        info!("connected to database at '{}' in {:?}", addr, timer.elapsed());

        Ok(Self {
            addr: addr.to_owned(),
            pool,
            _phantom: PhantomData,
        })
    }

    async fn get_connection(&self) -> DatabaseResult<PoolConnection<Sqlite>> {
        trace!("acquiring connection to database at '{}'", self.addr);
        let timer = time::Instant::now();
        let conn = self.pool.acquire().await?;
        trace!(
            "acquired connection to database at '{}' in {:?}",
            self.addr,
            timer.elapsed()
        );
        Ok(conn)
    }
}

#[derive(Debug)]
pub enum DatabaseError {
    SqlxError(sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(sqlx_error: sqlx::Error) -> Self {
        DatabaseError::SqlxError(sqlx_error)
    }
}

impl Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            DatabaseError::SqlxError(e) => e.to_string(),
        };

        write!(f, "{}", output)
    }
}

impl std::error::Error for DatabaseError {}
