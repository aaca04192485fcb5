//! Shared handler state.
//!
//! # Responsibility
//! - Own the single SQLite connection used by the server.
//! - Run tree service calls off the async runtime.
//!
//! # Invariants
//! - Service calls hold the connection mutex for their whole duration, so
//!   requests never interleave inside one operation.

use crate::error::ApiError;
use nodetree_core::{SqliteNodeStore, TreeService, TreeServiceResult};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    conn: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Wraps a connection returned by `nodetree_core::db::open_db*`.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` against a fresh service on the blocking pool.
    ///
    /// `operation` names the work in 500 responses, e.g. `"adding the node"`.
    pub async fn with_tree_service<T, F>(
        &self,
        operation: &'static str,
        f: F,
    ) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&TreeService<SqliteNodeStore<'_>>) -> TreeServiceResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| ApiError::internal(operation, "connection mutex poisoned"))?;
            let store =
                SqliteNodeStore::try_new(&guard).map_err(|err| ApiError::internal(operation, err))?;
            let service = TreeService::new(store);
            f(&service).map_err(|err| ApiError::from_service(operation, err))
        })
        .await
        .map_err(|err| ApiError::internal(operation, err))?
    }
}
