//! Node domain model.
//!
//! # Responsibility
//! - Define the canonical node record stored in `nodes`.
//! - Own title normalization and length rules.
//!
//! # Invariants
//! - `title` is non-blank and at most [`MAX_TITLE_CHARS`] characters.
//! - `parent_node_id` is `None` only for the root.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable node identifier (SQLite rowid).
pub type NodeId = i64;

/// Maximum title length, counted in characters.
pub const MAX_TITLE_CHARS: usize = 255;

/// Persisted node record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    /// `None` means this node is the root.
    pub parent_node_id: Option<NodeId>,
    /// Sibling display order within one parent, ascending.
    pub ordering: i64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_node_id.is_none()
    }
}

/// Partial update applied by [`crate::NodeStore::update_node`].
///
/// `None` fields are left untouched. The root's parent cannot be changed
/// through this type; `parent_node_id` always names a concrete parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeUpdate {
    pub title: Option<String>,
    pub parent_node_id: Option<NodeId>,
    pub ordering: Option<i64>,
}

impl NodeUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.parent_node_id.is_none() && self.ordering.is_none()
    }
}

/// Title rule violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleError {
    /// Title is empty after trimming.
    Blank,
    /// Title is longer than [`MAX_TITLE_CHARS`].
    TooLong { chars: usize },
}

impl Display for TitleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "The title field is required."),
            Self::TooLong { .. } => write!(
                f,
                "The title field must not be greater than {MAX_TITLE_CHARS} characters."
            ),
        }
    }
}

impl Error for TitleError {}

/// Trims surrounding whitespace and checks title rules.
pub fn normalize_title(value: &str) -> Result<String, TitleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TitleError::Blank);
    }
    let chars = trimmed.chars().count();
    if chars > MAX_TITLE_CHARS {
        return Err(TitleError::TooLong { chars });
    }
    Ok(trimmed.to_string())
}
