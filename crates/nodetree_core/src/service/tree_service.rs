//! Node tree use-case service.
//!
//! # Responsibility
//! - Enforce tree invariants above the store layer.
//! - Provide tree fetch, add, update, delete, move and reorder operations.
//!
//! # Invariants
//! - The root (the node without parent) is never deleted or re-parented.
//! - New and moved nodes are appended after the current last sibling.
//! - Re-parenting never creates a parent-child cycle.

use crate::model::node::{normalize_title, Node, NodeId, NodeUpdate, TitleError};
use crate::model::tree::{NodeTree, TreeAssemblyError};
use crate::repo::node_store::{NodeStore, NodeStoreError};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Request field name, e.g. `title` or `parent_node_id`.
    pub field: &'static str,
    pub message: String,
}

/// Root-protection and structural rule violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidOperation {
    DeleteRoot,
    MoveRoot,
    ChangeRootParent,
    /// New parent is the node itself or one of its descendants.
    Cycle {
        node_id: NodeId,
        parent_id: NodeId,
    },
}

impl Display for InvalidOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeleteRoot => write!(f, "Cannot delete root node"),
            Self::MoveRoot => write!(f, "Cannot move root node"),
            Self::ChangeRootParent => write!(f, "Cannot change parent of root node"),
            Self::Cycle { node_id, parent_id } => write!(
                f,
                "Cannot move node {node_id} under its own descendant {parent_id}"
            ),
        }
    }
}

/// What could not be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Root,
    Node(NodeId),
    Parent(NodeId),
}

impl Display for Missing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => write!(f, "Root node not found"),
            Self::Node(_) => write!(f, "Node not found"),
            Self::Parent(_) => write!(f, "Parent node not found"),
        }
    }
}

/// Errors from tree service operations.
#[derive(Debug)]
pub enum TreeServiceError {
    /// Input failed shape or length rules.
    Validation(Vec<FieldError>),
    /// Target node, parent or root does not exist.
    NotFound(Missing),
    /// Root-protection or cycle rule violated.
    InvalidOperation(InvalidOperation),
    /// Store fault or corrupt persisted tree.
    Internal(InternalError),
}

/// Sources of [`TreeServiceError::Internal`].
#[derive(Debug)]
pub enum InternalError {
    Store(NodeStoreError),
    Assembly(TreeAssemblyError),
}

impl Display for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Assembly(err) => write!(f, "{err}"),
        }
    }
}

impl Display for TreeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(fields) => {
                write!(f, "validation failed")?;
                for field in fields {
                    write!(f, "; {}: {}", field.field, field.message)?;
                }
                Ok(())
            }
            Self::NotFound(missing) => write!(f, "{missing}"),
            Self::InvalidOperation(op) => write!(f, "{op}"),
            Self::Internal(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TreeServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Internal(InternalError::Store(err)) => Some(err),
            Self::Internal(InternalError::Assembly(err)) => Some(err),
            _ => None,
        }
    }
}

impl From<NodeStoreError> for TreeServiceError {
    fn from(value: NodeStoreError) -> Self {
        match value {
            NodeStoreError::NodeNotFound(id) => Self::NotFound(Missing::Node(id)),
            NodeStoreError::WouldCreateCycle { node_id, parent_id } => {
                Self::InvalidOperation(InvalidOperation::Cycle { node_id, parent_id })
            }
            other => Self::Internal(InternalError::Store(other)),
        }
    }
}

impl From<TreeAssemblyError> for TreeServiceError {
    fn from(value: TreeAssemblyError) -> Self {
        Self::Internal(InternalError::Assembly(value))
    }
}

impl From<InvalidOperation> for TreeServiceError {
    fn from(value: InvalidOperation) -> Self {
        Self::InvalidOperation(value)
    }
}

pub type TreeServiceResult<T> = Result<T, TreeServiceError>;

/// Node tree service facade.
pub struct TreeService<S: NodeStore> {
    store: S,
}

impl<S: NodeStore> TreeService<S> {
    /// Creates service from store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads the whole tree starting at the root.
    pub fn get_tree(&self) -> TreeServiceResult<NodeTree> {
        let root = self
            .store
            .get_root()?
            .ok_or(TreeServiceError::NotFound(Missing::Root))?;
        self.assemble(root)
    }

    /// Loads the tree rooted at `id`.
    pub fn get_subtree(&self, id: NodeId) -> TreeServiceResult<NodeTree> {
        let node = self.require_node(id)?;
        self.assemble(node)
    }

    /// Loads one node.
    pub fn get_node(&self, id: NodeId) -> TreeServiceResult<Node> {
        self.require_node(id)
    }

    /// Appends a new child under `parent_id`.
    pub fn add_node(&self, parent_id: NodeId, title: &str) -> TreeServiceResult<Node> {
        let title = validate_title(title)?;
        self.store
            .get_node(parent_id)?
            .ok_or(TreeServiceError::NotFound(Missing::Parent(parent_id)))?;

        let node = self.store.append_child(parent_id, &title)?;
        info!(
            "event=node_add module=service status=ok node_id={} parent_id={} ordering={}",
            node.id, parent_id, node.ordering
        );
        Ok(node)
    }

    /// Renames a node and optionally re-parents it.
    ///
    /// A `new_parent_id` equal to the current parent only renames.
    pub fn update_node(
        &self,
        id: NodeId,
        title: &str,
        new_parent_id: Option<NodeId>,
    ) -> TreeServiceResult<Node> {
        let node = self.require_node(id)?;
        let title = validate_title(title)?;

        // Root protection wins over parent lookup: any non-null parent is refused.
        if node.is_root() && new_parent_id.is_some() {
            return Err(InvalidOperation::ChangeRootParent.into());
        }
        if let Some(parent_id) = new_parent_id {
            if self.store.get_node(parent_id)?.is_none() {
                return Err(TreeServiceError::Validation(vec![FieldError {
                    field: "parent_node_id",
                    message: "The selected parent node id is invalid.".to_string(),
                }]));
            }
        }

        let Some(parent_id) = new_parent_id.filter(|&parent| Some(parent) != node.parent_node_id)
        else {
            return self
                .store
                .update_node(
                    id,
                    &NodeUpdate {
                        title: Some(title),
                        ..NodeUpdate::default()
                    },
                )
                .map_err(Into::into);
        };

        let updated = self.store.reparent_to_end(id, parent_id, Some(&title))?;
        info!(
            "event=node_reparent module=service status=ok node_id={} parent_id={} ordering={}",
            id, parent_id, updated.ordering
        );
        Ok(updated)
    }

    /// Deletes a non-root node and its descendants.
    pub fn delete_node(&self, id: NodeId) -> TreeServiceResult<()> {
        let node = self.require_node(id)?;
        if node.is_root() {
            return Err(InvalidOperation::DeleteRoot.into());
        }
        self.store.delete_node(id)?;
        info!("event=node_delete module=service status=ok node_id={id}");
        Ok(())
    }

    /// Moves a non-root node to the end of `new_parent_id`'s children.
    pub fn move_node(&self, id: NodeId, new_parent_id: NodeId) -> TreeServiceResult<Node> {
        let node = self.require_node(id)?;
        self.store
            .get_node(new_parent_id)?
            .ok_or(TreeServiceError::NotFound(Missing::Parent(new_parent_id)))?;
        if node.is_root() {
            return Err(InvalidOperation::MoveRoot.into());
        }

        let moved = self.store.reparent_to_end(id, new_parent_id, None)?;
        info!(
            "event=node_move module=service status=ok node_id={} parent_id={} ordering={}",
            id, new_parent_id, moved.ordering
        );
        Ok(moved)
    }

    /// Puts a node first among its siblings.
    pub fn reorder_node(&self, id: NodeId) -> TreeServiceResult<()> {
        self.require_node(id)?;
        self.store.move_to_front(id)?;
        info!("event=node_reorder module=service status=ok node_id={id}");
        Ok(())
    }

    fn require_node(&self, id: NodeId) -> TreeServiceResult<Node> {
        self.store
            .get_node(id)?
            .ok_or(TreeServiceError::NotFound(Missing::Node(id)))
    }

    fn assemble(&self, root: Node) -> TreeServiceResult<NodeTree> {
        let root_id = root.id;
        let descendants = self
            .store
            .list_subtree(root_id)?
            .into_iter()
            .filter(|node| node.id != root_id)
            .collect::<Vec<_>>();
        let tree = NodeTree::assemble(root, descendants)?;
        debug!(
            "event=tree_load module=service status=ok root_id={} node_count={}",
            root_id,
            tree.len()
        );
        Ok(tree)
    }
}

fn validate_title(value: &str) -> TreeServiceResult<String> {
    normalize_title(value).map_err(|err| TreeServiceError::Validation(vec![title_field_error(err)]))
}

fn title_field_error(err: TitleError) -> FieldError {
    FieldError {
        field: "title",
        message: err.to_string(),
    }
}
