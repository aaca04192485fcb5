//! Owned tree read model.
//!
//! # Responsibility
//! - Materialize a root node plus its descendants into an arena.
//! - Serialize as nested `{..node, children: [...]}` objects.
//!
//! # Invariants
//! - Index `0` is always the tree root.
//! - Child index lists are sorted by `ordering ASC, id ASC`.
//! - Every stored node is reachable from index `0`.
//! - Arena order is depth-first pre-order.

use crate::model::node::{Node, NodeId};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors raised while assembling a [`NodeTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeAssemblyError {
    /// Nodes whose parent chain never reaches the tree root.
    Unreachable(Vec<NodeId>),
}

impl Display for TreeAssemblyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable(ids) => {
                write!(f, "nodes not reachable from tree root: {ids:?}")
            }
        }
    }
}

impl Error for TreeAssemblyError {}

/// Fully materialized tree rooted at one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTree {
    nodes: Vec<Node>,
    children: Vec<Vec<usize>>,
}

impl NodeTree {
    /// Builds an arena from `root` and an unordered set of its descendants.
    ///
    /// Descendants may arrive in any order; siblings are sorted here.
    ///
    /// # Errors
    /// - Returns `Unreachable` when some descendant does not hang off `root`.
    pub fn assemble(root: Node, descendants: Vec<Node>) -> Result<Self, TreeAssemblyError> {
        let expected = descendants.len() + 1;
        let mut by_parent: HashMap<NodeId, Vec<Node>> = HashMap::new();
        for node in descendants {
            match node.parent_node_id {
                Some(parent_id) => by_parent.entry(parent_id).or_default().push(node),
                None => return Err(TreeAssemblyError::Unreachable(vec![node.id])),
            }
        }
        for siblings in by_parent.values_mut() {
            siblings.sort_by_key(|node| (node.ordering, node.id));
        }

        let mut tree = Self {
            nodes: Vec::with_capacity(expected),
            children: Vec::with_capacity(expected),
        };

        // Nodes enter the arena as they are popped, so arena order is pre-order.
        // Explicit stack so deep trees do not grow the call stack.
        let mut stack: Vec<(Node, Option<usize>)> = vec![(root, None)];
        while let Some((node, parent_index)) = stack.pop() {
            let node_id = node.id;
            let index = tree.push(node);
            if let Some(parent_index) = parent_index {
                tree.children[parent_index].push(index);
            }
            if let Some(siblings) = by_parent.remove(&node_id) {
                stack.extend(
                    siblings
                        .into_iter()
                        .rev()
                        .map(|child| (child, Some(index))),
                );
            }
        }

        if !by_parent.is_empty() {
            let mut orphans = by_parent
                .into_values()
                .flatten()
                .map(|node| node.id)
                .collect::<Vec<_>>();
            orphans.sort_unstable();
            return Err(TreeAssemblyError::Unreachable(orphans));
        }

        Ok(tree)
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.children.push(Vec::new());
        self.nodes.len() - 1
    }

    /// Returns the tree root.
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Number of nodes in the tree, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`; a tree holds at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Ordered direct children of `id`. Empty when `id` is a leaf or absent.
    pub fn children_of(&self, id: NodeId) -> Vec<&Node> {
        self.nodes
            .iter()
            .position(|node| node.id == id)
            .map(|index| {
                self.children[index]
                    .iter()
                    .map(|&child| &self.nodes[child])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nodes in depth-first pre-order, siblings by ordering.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }
}

impl Serialize for NodeTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NestedNode {
            tree: self,
            index: 0,
        }
        .serialize(serializer)
    }
}

struct NestedNode<'a> {
    tree: &'a NodeTree,
    index: usize,
}

impl Serialize for NestedNode<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = &self.tree.nodes[self.index];
        let mut state = serializer.serialize_struct("Node", 7)?;
        state.serialize_field("id", &node.id)?;
        state.serialize_field("title", &node.title)?;
        state.serialize_field("parent_node_id", &node.parent_node_id)?;
        state.serialize_field("ordering", &node.ordering)?;
        state.serialize_field("created_at", &node.created_at)?;
        state.serialize_field("updated_at", &node.updated_at)?;
        state.serialize_field(
            "children",
            &NestedChildren {
                tree: self.tree,
                indices: &self.tree.children[self.index],
            },
        )?;
        state.end()
    }
}

struct NestedChildren<'a> {
    tree: &'a NodeTree,
    indices: &'a [usize],
}

impl Serialize for NestedChildren<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.indices.iter().map(|&index| NestedNode {
            tree: self.tree,
            index,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeTree, TreeAssemblyError};
    use crate::model::node::{Node, NodeId};

    fn node(id: NodeId, parent: Option<NodeId>, ordering: i64) -> Node {
        Node {
            id,
            title: format!("n{id}"),
            parent_node_id: parent,
            ordering,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn assemble_orders_children_and_walks_depth_first() {
        let tree = NodeTree::assemble(
            node(1, None, 0),
            vec![
                node(4, Some(2), 1),
                node(3, Some(1), 2),
                node(2, Some(1), 1),
                node(5, Some(1), 2),
            ],
        )
        .unwrap();

        let order = tree.iter().map(|node| node.id).collect::<Vec<_>>();
        assert_eq!(order, vec![1, 2, 4, 3, 5]);
        let root_children = tree
            .children_of(1)
            .into_iter()
            .map(|node| node.id)
            .collect::<Vec<_>>();
        assert_eq!(root_children, vec![2, 3, 5]);
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn assemble_rejects_detached_nodes() {
        let err = NodeTree::assemble(node(1, None, 0), vec![node(7, Some(99), 1)]).unwrap_err();
        assert_eq!(err, TreeAssemblyError::Unreachable(vec![7]));
    }
}
