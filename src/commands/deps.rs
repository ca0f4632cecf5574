use super::{discover, report_root_failure};
use brewc::{InstallOptions, PackageManager};
use colored::Colorize;
use std::io::IsTerminal;

pub async fn deps(pm: &PackageManager, name: &str, tree: bool, options: &InstallOptions) -> usize {
    let is_tty = std::io::stdout().is_terminal();

    let formula_tree = match discover(pm, name, options).await {
        Ok(t) => t,
        Err(e) => {
            report_root_failure(name, &e);
            return 1;
        }
    };

    for failure in formula_tree.take_failures() {
        eprintln!(
            "{} could not resolve {}: {}",
            "⚠".yellow(),
            failure.name.bold(),
            failure.error
        );
    }

    if tree {
        print!("{}", formula_tree.render());
        return 0;
    }

    let deps: Vec<String> = formula_tree.names().into_iter().skip(1).collect();
    if deps.is_empty() {
        if is_tty {
            println!("{} No dependencies to install", "✓".green());
        }
        return 0;
    }

    for dep in deps {
        if is_tty {
            println!("{}", dep.cyan());
        } else {
            println!("{dep}");
        }
    }

    0
}
