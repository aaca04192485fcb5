//! Core domain logic for nodetree.
//! This crate is the single source of truth for tree invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::node::{normalize_title, Node, NodeId, NodeUpdate, TitleError, MAX_TITLE_CHARS};
pub use model::tree::{NodeTree, TreeAssemblyError};
pub use repo::node_store::{NodeStore, NodeStoreError, NodeStoreResult, SqliteNodeStore};
pub use service::tree_service::{
    FieldError, InternalError, InvalidOperation, Missing, TreeService, TreeServiceError,
    TreeServiceResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
