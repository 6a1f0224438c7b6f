//! Fixed-size SQLite connection pool.
//!
//! Connections are opened up front and handed out through an RAII guard that
//! returns them on drop. Callers block until a connection is free or the
//! acquire timeout elapses.

use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rusqlite::{Connection, OpenFlags};

use crate::config::DatabaseConfig;
use crate::error::{SlashingProtectionError, SlashingProtectionResult};

/// Opens a connection with the durability pragmas applied.
pub fn open_connection(config: &DatabaseConfig) -> SlashingProtectionResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&conn, config)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection, config: &DatabaseConfig) -> SlashingProtectionResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = {};",
        config.journal_mode.pragma_value()
    ))?;
    conn.execute_batch(&format!(
        "PRAGMA synchronous = {};",
        config.sync_mode.pragma_value()
    ))?;
    conn.busy_timeout(config.busy_timeout())?;
    Ok(())
}

/// Pool of open connections.
pub struct ConnectionPool {
    idle: Mutex<Vec<Connection>>,
    available: Condvar,
    size: usize,
    acquire_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(connections: Vec<Connection>, acquire_timeout: Duration) -> Self {
        let size = connections.len();
        Self {
            idle: Mutex::new(connections),
            available: Condvar::new(),
            size,
            acquire_timeout,
        }
    }

    /// Total connections owned by the pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Borrow a connection, waiting up to the acquire timeout.
    pub fn get(&self) -> SlashingProtectionResult<PooledConnection<'_>> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut idle = self.idle.lock();
        loop {
            if let Some(conn) = idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }
            if self.available.wait_until(&mut idle, deadline).timed_out() && idle.is_empty() {
                return Err(SlashingProtectionError::PoolTimeout(self.acquire_timeout));
            }
        }
    }

    fn release(&self, conn: Connection) {
        self.idle.lock().push(conn);
        self.available.notify_one();
    }
}

/// A connection on loan from the pool.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    // Only `None` inside `drop`.
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("pooled connection used after release")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("pooled connection used after release")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
