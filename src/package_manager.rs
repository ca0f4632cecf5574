//! High-level PackageManager API tying discovery, prefetching and `brew` together.
//!
//! Every operation follows the same shape:
//!
//! 1. build the dependency tree of the requested formula ([`TreeBuilder`]),
//! 2. prefetch manifests and bottles for every node ([`Downloader::fetch_all`]),
//! 3. walk the tree in a dependency-safe order and hand each node to `brew`.
//!
//! Only a failure to resolve the requested formula itself is returned as an
//! error. Everything below the root (a dependency that cannot be fetched, a
//! bottle that fails its checksum, a `brew` call that exits non-zero) is
//! collected in the returned [`OperationReport`].
//!
//! # Quick Start
//!
//! ```no_run
//! use brewc::{Config, PackageManager};
//! use brewc::package_manager::InstallOptions;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pm = PackageManager::new(Config::from_env()?)?;
//!
//!     let report = pm.install("ffmpeg", &InstallOptions::default()).await?;
//!     println!("{} formulae in tree, {} failures", report.nodes, report.failure_count());
//!     Ok(())
//! }
//! ```

use crate::api::{BrewApi, FormulaSource};
use crate::brew::Brew;
use crate::builder::{BuildOptions, TreeBuilder};
use crate::cellar::Cellar;
use crate::config::Config;
use crate::download::Downloader;
use crate::error::Result;
use crate::platform;
use crate::traverse::{self, TraversalReport};
use crate::tree::{DiscoveryFailure, FormulaTree};
use indicatif::MultiProgress;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Discovery settings for commands that build a tree
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Maximum distance from the requested formula; `None` is unlimited
    pub max_depth: Option<usize>,
    /// Also descend into formulae that are already installed
    pub include_installed: bool,
}

/// How much of the dependency tree `uninstall` removes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UninstallMode {
    /// The requested formula only
    #[default]
    Only,
    /// The formula and its direct dependencies
    UnusedDependencies,
    /// The formula and every nested dependency
    AllNestedDependencies,
}

impl UninstallMode {
    fn max_depth(self) -> Option<usize> {
        match self {
            Self::Only => Some(0),
            Self::UnusedDependencies => Some(1),
            Self::AllNestedDependencies => None,
        }
    }
}

/// Outcome of one operation on one requested formula
#[derive(Debug)]
pub struct OperationReport {
    pub name: String,
    /// Formulae in the dependency tree, root included
    pub nodes: usize,
    /// Requested formula was already installed, nothing to do
    pub already_installed: bool,
    pub discovery_failures: Vec<DiscoveryFailure>,
    pub fetch: Option<TraversalReport>,
    pub actions: Option<TraversalReport>,
    pub elapsed: Duration,
}

impl OperationReport {
    fn new(tree: &FormulaTree) -> Self {
        Self {
            name: tree.formula(tree.root()).name.clone(),
            nodes: tree.len(),
            already_installed: false,
            discovery_failures: tree.take_failures(),
            fetch: None,
            actions: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn failure_count(&self) -> usize {
        self.discovery_failures.len()
            + self.fetch.as_ref().map_or(0, |r| r.failures.len())
            + self.actions.as_ref().map_or(0, |r| r.failures.len())
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Package manager front-end, generic over where formula metadata comes from
pub struct PackageManager<S = BrewApi> {
    source: Arc<S>,
    config: Config,
    cellar: Cellar,
    downloader: Downloader,
    brew: Option<Brew>,
    verbose: bool,
}

impl PackageManager<BrewApi> {
    /// Production setup: Homebrew API and detected bottle tag. `brew` is
    /// looked up in its usual locations the first time an operation needs it.
    pub fn new(config: Config) -> Result<Self> {
        let tag = platform::detect_bottle_tag()?;
        let api = BrewApi::new(&config)?;
        let downloader = Downloader::new(&config, tag)?;
        Ok(Self::with_parts(Arc::new(api), config, downloader))
    }
}

impl<S: FormulaSource> PackageManager<S> {
    pub fn with_parts(source: Arc<S>, config: Config, downloader: Downloader) -> Self {
        Self {
            source,
            cellar: Cellar::new(&config.cellar),
            config,
            downloader,
            brew: None,
            verbose: false,
        }
    }

    /// Use this `brew` instead of searching for one
    pub fn with_brew(mut self, brew: Brew) -> Self {
        self.brew = Some(brew);
        self
    }

    /// Pass `--verbose` through to `brew` and show its output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.downloader = self.downloader.with_progress(progress);
        self
    }

    fn builder(&self, options: &InstallOptions) -> TreeBuilder<S> {
        TreeBuilder::new(
            Arc::clone(&self.source),
            self.cellar.clone(),
            BuildOptions {
                include_installed: options.include_installed,
                max_depth: options.max_depth,
                concurrency: self.config.threads,
                unique: true,
            },
        )
    }

    /// Resolve the dependency tree without downloading anything
    pub async fn deps(&self, name: &str, options: &InstallOptions) -> Result<FormulaTree> {
        self.builder(options).build(name).await
    }

    /// Download manifests and bottles for `name` and its missing dependencies
    pub async fn fetch(&self, name: &str, options: &InstallOptions) -> Result<OperationReport> {
        let start = Instant::now();
        let tree = self.deps(name, options).await?;
        let mut report = self.fetch_tree(&tree).await?;
        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// Prefetch every node of an already discovered tree
    pub async fn fetch_tree(&self, tree: &FormulaTree) -> Result<OperationReport> {
        let start = Instant::now();
        let mut report = OperationReport::new(tree);

        self.prepare_cache()?;
        report.fetch = Some(self.downloader.fetch_all(tree, self.config.threads).await);

        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// Prefetch everything, then install dependencies before their dependents
    pub async fn install(&self, name: &str, options: &InstallOptions) -> Result<OperationReport> {
        let start = Instant::now();
        let tree = self.deps(name, options).await?;
        let mut report = self.install_tree(&tree, options).await?;
        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// The install step of [`install`](Self::install) for an already discovered tree
    pub async fn install_tree(&self, tree: &FormulaTree, options: &InstallOptions) -> Result<OperationReport> {
        let start = Instant::now();
        let mut report = OperationReport::new(tree);

        if !options.include_installed && self.root_installed(tree) {
            info!(formula = %report.name, "already installed");
            report.already_installed = true;
            report.elapsed = start.elapsed();
            return Ok(report);
        }

        let brew = self.brew()?;
        self.prepare_cache()?;
        report.fetch = Some(self.downloader.fetch_all(tree, self.config.threads).await);

        let verbose = self.verbose;
        report.actions = Some(
            traverse::child_first(tree, self.config.threads, move |formula| {
                let brew = brew.clone();
                async move { brew.install(&formula.name, verbose).await }
            })
            .await,
        );

        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// Install missing dependencies, then reinstall the requested formula itself
    pub async fn reinstall(&self, name: &str, options: &InstallOptions) -> Result<OperationReport> {
        let start = Instant::now();
        let tree = self.deps(name, options).await?;
        let mut report = self.reinstall_tree(&tree).await?;
        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// The reinstall step of [`reinstall`](Self::reinstall) for an already discovered tree
    pub async fn reinstall_tree(&self, tree: &FormulaTree) -> Result<OperationReport> {
        let start = Instant::now();
        let mut report = OperationReport::new(tree);

        let brew = self.brew()?;
        self.prepare_cache()?;
        report.fetch = Some(self.downloader.fetch_all(tree, self.config.threads).await);

        let verbose = self.verbose;
        let root = report.name.clone();
        report.actions = Some(
            traverse::child_first(tree, self.config.threads, move |formula| {
                let brew = brew.clone();
                let is_root = formula.name == root;
                async move {
                    if is_root {
                        brew.reinstall(&formula.name, verbose).await
                    } else {
                        brew.install(&formula.name, verbose).await
                    }
                }
            })
            .await,
        );

        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// Uninstall `name` and, depending on `mode`, its installed dependencies,
    /// dependents first. `brew` refuses to remove a dependency another
    /// installed formula still needs, which shows up as an action failure for
    /// that node.
    pub async fn uninstall(&self, name: &str, mode: UninstallMode) -> Result<OperationReport> {
        let start = Instant::now();
        let brew = self.brew()?;

        let options = InstallOptions {
            max_depth: mode.max_depth(),
            include_installed: true,
        };
        let tree = self.deps(name, &options).await?;
        let mut report = OperationReport::new(&tree);

        let cellar = self.cellar.clone();
        let verbose = self.verbose;
        report.actions = Some(
            traverse::parent_first(&tree, self.config.threads, move |formula| {
                let brew = brew.clone();
                let installed = formula.is_installed_in(&cellar);
                async move {
                    if !installed {
                        debug!(formula = %formula.name, "not installed, nothing to remove");
                        return Ok(());
                    }
                    brew.uninstall(&formula.name, verbose).await
                }
            })
            .await,
        );

        report.elapsed = start.elapsed();
        Ok(report)
    }

    fn brew(&self) -> Result<Brew> {
        match &self.brew {
            Some(brew) => Ok(brew.clone()),
            None => Brew::locate(),
        }
    }

    fn root_installed(&self, tree: &FormulaTree) -> bool {
        tree.formula(tree.root()).is_installed_in(&self.cellar)
    }

    fn prepare_cache(&self) -> Result<()> {
        self.config.ensure_dirs()
    }
}
