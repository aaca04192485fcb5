//! Store layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the data access contract used by the tree service.
//! - Isolate SQLite query details from business orchestration.
//!
//! # Invariants
//! - Store APIs return semantic errors (`NodeNotFound`) in addition to DB
//!   transport errors.
//! - Multi-statement writes commit or roll back as one unit.

pub mod node_store;
