//! Concurrent dependency discovery.
//!
//! [`TreeBuilder::build`] fetches the requested formula, then expands its
//! dependencies recursively: every dependency of a node becomes a tokio task
//! that fetches the record, attaches it to the [`FormulaTree`] and recurses
//! into it. A frame only returns once all of its tasks have finished.
//!
//! A single semaphore per build bounds the number of metadata requests in
//! flight across every frame. A permit is held for the fetch alone and is
//! released before the task recurses, so a parent waiting on its children
//! never holds a slot they need.
//!
//! Failures below the root are tolerated: the error is logged, recorded on
//! the tree ([`FormulaTree::take_failures`]) and the rest of the graph is
//! still discovered. Only a failure to fetch the root aborts the build.

use crate::api::{Formula, FormulaSource};
use crate::cellar::Cellar;
use crate::error::{BrewcError, Result};
use crate::tree::{FormulaTree, NodeId};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Keep discovering below formulae that are already installed
    pub include_installed: bool,
    /// Maximum distance from the root; `None` discovers everything
    pub max_depth: Option<usize>,
    /// Metadata requests allowed in flight at once
    pub concurrency: usize,
    /// Attach each formula name at most once
    pub unique: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            include_installed: false,
            max_depth: None,
            concurrency: crate::config::DEFAULT_THREADS,
            unique: true,
        }
    }
}

impl BuildOptions {
    /// Depth limit in CLI form, where any negative value means unlimited
    pub fn depth_from_flag(depth: i64) -> Option<usize> {
        usize::try_from(depth).ok()
    }
}

pub struct TreeBuilder<S> {
    source: Arc<S>,
    cellar: Cellar,
    options: BuildOptions,
}

/// State shared by every task of one build
struct Discovery<S> {
    source: Arc<S>,
    cellar: Cellar,
    options: BuildOptions,
    tree: FormulaTree,
    permits: Semaphore,
}

impl<S: FormulaSource> TreeBuilder<S> {
    pub fn new(source: Arc<S>, cellar: Cellar, options: BuildOptions) -> Self {
        Self {
            source,
            cellar,
            options,
        }
    }

    /// Discover the dependency tree of `name`.
    ///
    /// # Errors
    ///
    /// Only a failure to fetch `name` itself is returned; failures below the
    /// root are recorded on the returned tree.
    pub async fn build(&self, name: &str) -> Result<FormulaTree> {
        let root = self.source.fetch_formula(name).await?;
        let skip = !self.options.include_installed && root.is_installed_in(&self.cellar);
        let tree = FormulaTree::new(root, self.options.unique);

        // An installed formula already has its dependencies satisfied
        if skip {
            info!(formula = name, "already installed, skipping dependency discovery");
            return Ok(tree);
        }

        let discovery = Arc::new(Discovery {
            source: Arc::clone(&self.source),
            cellar: self.cellar.clone(),
            options: self.options.clone(),
            tree: tree.clone(),
            permits: Semaphore::new(self.options.concurrency.max(1)),
        });

        let path: Arc<[String]> = Arc::from(vec![name.to_string()]);
        expand(discovery, tree.root(), 0, path).await;

        info!(formula = name, nodes = tree.len(), "dependency tree built");
        Ok(tree)
    }
}

/// Spawn one discovery task per dependency of `node` and wait for all of them
fn expand<S: FormulaSource>(
    discovery: Arc<Discovery<S>>,
    node: NodeId,
    depth: usize,
    path: Arc<[String]>,
) -> BoxFuture<'static, ()> {
    async move {
        if discovery.options.max_depth.is_some_and(|max| depth >= max) {
            return;
        }

        let formula = discovery.tree.formula(node);
        let mut tasks = Vec::with_capacity(formula.dependencies.len());

        for dep in &formula.dependencies {
            if path.iter().any(|ancestor| ancestor == dep) {
                let mut cycle = path.to_vec();
                cycle.push(dep.clone());
                warn!(formula = %dep, "dependency cycle, not following");
                discovery
                    .tree
                    .record_failure(dep.clone(), BrewcError::CycleDetected(cycle));
                continue;
            }

            tasks.push(tokio::spawn(discover(
                Arc::clone(&discovery),
                node,
                dep.clone(),
                depth + 1,
                Arc::clone(&path),
            )));
        }

        for task in tasks {
            if let Err(e) = task.await {
                warn!(parent = %formula.name, "discovery task failed: {e}");
            }
        }
    }
    .boxed()
}

/// Fetch one dependency, attach it under `parent` and keep expanding
async fn discover<S: FormulaSource>(
    discovery: Arc<Discovery<S>>,
    parent: NodeId,
    name: String,
    depth: usize,
    path: Arc<[String]>,
) {
    if discovery.options.unique && discovery.tree.contains(&name) {
        debug!(formula = %name, "already discovered");
        return;
    }

    let fetched = match discovery.permits.acquire().await {
        Ok(_permit) => discovery.source.fetch_formula(&name).await,
        Err(_) => return,
    };

    let formula: Formula = match fetched {
        Ok(formula) => formula,
        Err(e) => {
            warn!(formula = %name, "failed to fetch dependency: {e}");
            discovery.tree.record_failure(name, e);
            return;
        }
    };

    if !discovery.options.include_installed && formula.is_installed_in(&discovery.cellar) {
        debug!(formula = %name, "dependency already installed");
        return;
    }

    let Some(child) = discovery.tree.insert(parent, formula) else {
        debug!(formula = %name, "lost insert race, discarding");
        return;
    };
    debug!(formula = %name, depth, "discovered");

    let mut child_path = path.to_vec();
    child_path.push(name);
    expand(discovery, child, depth, Arc::from(child_path)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_from_flag() {
        assert_eq!(BuildOptions::depth_from_flag(-1), None);
        assert_eq!(BuildOptions::depth_from_flag(0), Some(0));
        assert_eq!(BuildOptions::depth_from_flag(3), Some(3));
    }

    #[test]
    fn test_default_options() {
        let options = BuildOptions::default();
        assert!(options.unique);
        assert!(!options.include_installed);
        assert!(options.max_depth.is_none());
    }
}
