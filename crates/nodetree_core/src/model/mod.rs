//! Domain model for the ordered node tree.
//!
//! # Responsibility
//! - Define the persisted `Node` record and its title rules.
//! - Define the owned `NodeTree` read model handed to the API layer.
//!
//! # Invariants
//! - Every node is identified by a stable `NodeId`.
//! - Exactly one node has no parent.

pub mod node;
pub mod tree;
