//! Thread-safe formula tree filled in by concurrent discovery workers.
//!
//! Nodes live in an arena inside a single [`RwLock`]; a [`NodeId`] is an index
//! into it. Every mutation (appending a child, recording the name, bumping the
//! count) happens under the write lock, and membership checks take the read
//! lock. The tree is a cheap handle around an `Arc`, so each discovery task
//! holds its own clone.
//!
//! With uniqueness on, a name is attached at most once: whichever insert takes
//! the lock first wins and later inserts of the same name are rejected without
//! touching the tree. The result is therefore a tree and not the full
//! dependency DAG: a formula needed by several dependents hangs under the one
//! that discovered it first.

use crate::api::Formula;
use crate::error::BrewcError;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Handle to a node of one particular [`FormulaTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A dependency that could not be discovered
#[derive(Debug)]
pub struct DiscoveryFailure {
    pub name: String,
    pub error: BrewcError,
}

struct Node {
    formula: Arc<Formula>,
    children: Vec<NodeId>,
}

struct TreeState {
    nodes: Vec<Node>,
    present: HashSet<String>,
}

struct Shared {
    state: RwLock<TreeState>,
    failures: Mutex<Vec<DiscoveryFailure>>,
    unique: bool,
}

#[derive(Clone)]
pub struct FormulaTree {
    shared: Arc<Shared>,
}

impl FormulaTree {
    pub fn new(root: Formula, unique: bool) -> Self {
        let mut present = HashSet::new();
        present.insert(root.name.clone());

        let state = TreeState {
            nodes: vec![Node {
                formula: Arc::new(root),
                children: Vec::new(),
            }],
            present,
        };

        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                failures: Mutex::new(Vec::new()),
                unique,
            }),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Attach `formula` under `parent`.
    ///
    /// Returns `None` without mutating anything when uniqueness is on and the
    /// name is already in the tree.
    pub fn insert(&self, parent: NodeId, formula: Formula) -> Option<NodeId> {
        let mut state = self.shared.state.write();

        if self.shared.unique && state.present.contains(&formula.name) {
            return None;
        }

        let id = NodeId(state.nodes.len());
        state.present.insert(formula.name.clone());
        state.nodes.push(Node {
            formula: Arc::new(formula),
            children: Vec::new(),
        });
        state.nodes[parent.0].children.push(id);

        Some(id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shared.state.read().present.contains(name)
    }

    /// Number of nodes, root included. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.shared.state.read().nodes.len()
    }

    pub fn formula(&self, id: NodeId) -> Arc<Formula> {
        Arc::clone(&self.shared.state.read().nodes[id.0].formula)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.shared.state.read().nodes[id.0].children.clone()
    }

    /// Pre-order walk from the root, with each node's distance from the root
    pub fn nodes_with_depth(&self) -> Vec<(NodeId, usize)> {
        let state = self.shared.state.read();
        let mut out = Vec::with_capacity(state.nodes.len());
        let mut stack = vec![(NodeId(0), 0)];

        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            for child in state.nodes[id.0].children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }

        out
    }

    /// Names of every node in pre-order
    pub fn names(&self) -> Vec<String> {
        self.nodes_with_depth()
            .into_iter()
            .map(|(id, _)| self.formula(id).name.clone())
            .collect()
    }

    pub fn record_failure(&self, name: impl Into<String>, error: BrewcError) {
        self.shared.failures.lock().push(DiscoveryFailure {
            name: name.into(),
            error,
        });
    }

    /// Drain the discovery failures recorded so far
    pub fn take_failures(&self) -> Vec<DiscoveryFailure> {
        std::mem::take(&mut *self.shared.failures.lock())
    }

    /// Box-drawing rendering used by `brewc deps --tree`
    pub fn render(&self) -> String {
        let state = self.shared.state.read();
        let mut out = state.nodes[0].formula.name.clone();
        out.push('\n');
        render_children(&state, NodeId(0), "", &mut out);
        out
    }
}

fn render_children(state: &TreeState, id: NodeId, prefix: &str, out: &mut String) {
    let children = &state.nodes[id.0].children;
    for (i, child) in children.iter().enumerate() {
        let last = i == children.len() - 1;
        out.push_str(prefix);
        out.push_str(if last { "└── " } else { "├── " });
        out.push_str(&state.nodes[child.0].formula.name);
        out.push('\n');

        let nested = format!("{}{}", prefix, if last { "    " } else { "│   " });
        render_children(state, *child, &nested, out);
    }
}

impl fmt::Debug for FormulaTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaTree")
            .field("nodes", &self.names())
            .field("unique", &self.shared.unique)
            .finish()
    }
}
