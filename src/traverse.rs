//! Ordered, throttled walks over a built [`FormulaTree`].
//!
//! - [`child_first`] runs the action on a node only after it ran on every
//!   descendant (install order: dependencies before dependents).
//! - [`parent_first`] runs the action on a node before any descendant
//!   (uninstall order: dependents before dependencies).
//!
//! Each call keeps its own per-node status (pending, in progress, done) and
//! claims a node with a compare-and-set, so the action runs at most once per
//! node even if the node were reachable twice.
//!
//! Children of a node are visited as spawned tokio tasks. A counter of active
//! fan-out regions is shared by the whole walk: while it is below `budget`, up
//! to [`FAN_OUT_WIDTH`] children of a node run at once; past that, children
//! are visited one at a time. The walk never blocks waiting for a slot, it
//! only narrows.
//!
//! Action errors are logged and collected in [`TraversalReport::failures`];
//! they never stop siblings or ancestors from being visited.

use crate::api::Formula;
use crate::error::{BrewcError, Result};
use crate::tree::{FormulaTree, NodeId};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Children traversed concurrently while the budget allows it
pub const FAN_OUT_WIDTH: usize = 5;

const PENDING: u8 = 0;
const IN_PROGRESS: u8 = 1;
const DONE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    ChildFirst,
    ParentFirst,
}

/// An action that failed on one node
#[derive(Debug)]
pub struct ActionFailure {
    pub name: String,
    pub error: BrewcError,
}

#[derive(Debug, Default)]
pub struct TraversalReport {
    /// Nodes whose action ran, successfully or not
    pub visited: usize,
    pub failures: Vec<ActionFailure>,
}

impl TraversalReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run `action` on every node, descendants first
pub async fn child_first<F, Fut>(tree: &FormulaTree, budget: usize, action: F) -> TraversalReport
where
    F: Fn(Arc<Formula>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    traverse(tree, budget, Order::ChildFirst, action).await
}

/// Run `action` on every node, ancestors first
pub async fn parent_first<F, Fut>(tree: &FormulaTree, budget: usize, action: F) -> TraversalReport
where
    F: Fn(Arc<Formula>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    traverse(tree, budget, Order::ParentFirst, action).await
}

pub async fn traverse<F, Fut>(
    tree: &FormulaTree,
    budget: usize,
    order: Order,
    action: F,
) -> TraversalReport
where
    F: Fn(Arc<Formula>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let walk = Arc::new(Walk {
        tree: tree.clone(),
        action,
        order,
        budget,
        status: (0..tree.len()).map(|_| AtomicU8::new(PENDING)).collect(),
        active: AtomicUsize::new(0),
        visited: AtomicUsize::new(0),
        failures: Mutex::new(Vec::new()),
    });

    visit(Arc::clone(&walk), tree.root()).await;

    TraversalReport {
        visited: walk.visited.load(Ordering::SeqCst),
        failures: std::mem::take(&mut *walk.failures.lock()),
    }
}

struct Walk<F> {
    tree: FormulaTree,
    action: F,
    order: Order,
    budget: usize,
    status: Vec<AtomicU8>,
    active: AtomicUsize,
    visited: AtomicUsize,
    failures: Mutex<Vec<ActionFailure>>,
}

/// Holds one slot of the active fan-out counter
struct FanOut<'a> {
    active: &'a AtomicUsize,
}

impl Drop for FanOut<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<F, Fut> Walk<F>
where
    F: Fn(Arc<Formula>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn claim(&self, node: NodeId) -> bool {
        self.status[node.index()]
            .compare_exchange(PENDING, IN_PROGRESS, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn finish(&self, node: NodeId) {
        self.status[node.index()].store(DONE, Ordering::SeqCst);
    }

    /// Enter a fan-out region and return how many children may run at once
    fn enter_fan_out(&self) -> (FanOut<'_>, usize) {
        let previous = self.active.fetch_add(1, Ordering::SeqCst);
        let width = if previous < self.budget {
            FAN_OUT_WIDTH
        } else {
            1
        };
        (
            FanOut {
                active: &self.active,
            },
            width,
        )
    }

    async fn run_action(&self, node: NodeId) {
        let formula = self.tree.formula(node);
        let name = formula.name.clone();

        debug!(formula = %name, "running action");
        if let Err(error) = (self.action)(formula).await {
            warn!(formula = %name, "action failed: {error}");
            self.failures.lock().push(ActionFailure { name, error });
        }
        self.visited.fetch_add(1, Ordering::SeqCst);
    }
}

fn visit<F, Fut>(walk: Arc<Walk<F>>, node: NodeId) -> BoxFuture<'static, ()>
where
    F: Fn(Arc<Formula>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async move {
        if !walk.claim(node) {
            return;
        }

        match walk.order {
            Order::ParentFirst => {
                walk.run_action(node).await;
                visit_children(&walk, node).await;
            }
            Order::ChildFirst => {
                visit_children(&walk, node).await;
                walk.run_action(node).await;
            }
        }

        walk.finish(node);
    }
    .boxed()
}

async fn visit_children<F, Fut>(walk: &Arc<Walk<F>>, node: NodeId)
where
    F: Fn(Arc<Formula>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let children = walk.tree.children(node);
    if children.is_empty() {
        return;
    }

    let (_slot, width) = walk.enter_fan_out();

    futures::stream::iter(children)
        .map(|child| tokio::spawn(visit(Arc::clone(walk), child)))
        .buffer_unordered(width)
        .for_each(|joined| async move {
            if let Err(e) = joined {
                warn!("traversal task failed: {e}");
            }
        })
        .await;
}
