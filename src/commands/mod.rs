//! Command implementations for the brewc CLI
//!
//! Each command processes its formula names one after another. A name that
//! cannot be resolved is reported and skipped; the command returns how many
//! names failed that way so `main` can pick the exit status.

pub mod deps;
pub mod fetch;
pub mod install;
pub mod reinstall;
pub mod uninstall;

pub use deps::deps;
pub use fetch::fetch;
pub use install::install;
pub use reinstall::reinstall;
pub use uninstall::uninstall;

use brewc::{BrewcError, FormulaTree, InstallOptions, OperationReport, PackageManager, Result, TraversalReport};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

pub(crate) fn banner(action: &str, name: &str) {
    println!("{} {} {}", "==>".blue().bold(), action, name.magenta().bold());
}

pub(crate) fn report_root_failure(name: &str, err: &BrewcError) {
    eprintln!("  {} {}: {}", "✗".red(), name.bold(), err);
}

/// Resolve the tree of `name` behind a spinner that is gone before any
/// download bar is drawn
pub(crate) async fn discover(pm: &PackageManager, name: &str, options: &InstallOptions) -> Result<FormulaTree> {
    let spinner = discovery_spinner(name);
    let tree = pm.deps(name, options).await;
    spinner.finish_and_clear();
    tree
}

fn discovery_spinner(name: &str) -> ProgressBar {
    if !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Resolving dependencies of {name}..."));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_traversal(label: &str, report: &TraversalReport) {
    for failure in &report.failures {
        println!(
            "  {} {} {}: {}",
            "✗".red(),
            label,
            failure.name.bold(),
            failure.error
        );
    }
}

pub(crate) fn print_report(report: &OperationReport, verb: &str) {
    for failure in &report.discovery_failures {
        println!(
            "  {} could not resolve {}: {}",
            "⚠".yellow(),
            failure.name.bold(),
            failure.error
        );
    }

    if let Some(fetch) = &report.fetch {
        print_traversal("fetch", fetch);
    }
    if let Some(actions) = &report.actions {
        print_traversal(verb, actions);
    }

    let summary = format!(
        "{} formulae, {:.1}s",
        report.nodes,
        report.elapsed.as_secs_f64()
    );
    if report.is_success() {
        println!("  {} {} {} ({})", "✓".green(), verb, report.name.bold(), summary.dimmed());
    } else {
        println!(
            "  {} {} {} with {} failure(s) ({})",
            "⚠".yellow(),
            verb,
            report.name.bold(),
            report.failure_count(),
            summary.dimmed()
        );
    }
}
