pub mod migrations;
pub mod queries;

use std::sync::{Arc, Mutex};

use anyhow::Context;
use rusqlite::Connection;

pub type Db = Arc<Mutex<Connection>>;

/// Opens the store at `path` (`:memory:` for an ephemeral one) and brings its schema up to date.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {path}"))?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

pub fn shared(conn: Connection) -> Db {
    Arc::new(Mutex::new(conn))
}
