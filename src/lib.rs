//! Library interface for brewc
//!
//! brewc speeds up Homebrew installs by discovering a formula's whole
//! dependency tree concurrently, prefetching every bottle into Homebrew's own
//! cache, and then driving `brew` over the tree in dependency order.

pub mod api;
pub mod brew;
pub mod builder;
pub mod cellar;
pub mod config;
pub mod download;
pub mod error;
pub mod manifest;
pub mod package_manager;
pub mod platform;
pub mod traverse;
pub mod tree;

pub use api::{BrewApi, Formula, FormulaSource};
pub use brew::Brew;
pub use builder::{BuildOptions, TreeBuilder};
pub use cellar::Cellar;
pub use config::Config;
pub use download::Downloader;
pub use error::{BrewcError, Result};
pub use package_manager::{InstallOptions, OperationReport, PackageManager, UninstallMode};
pub use traverse::{TraversalReport, child_first, parent_first};
pub use tree::{FormulaTree, NodeId};
