use super::{banner, discover, print_report, report_root_failure};
use brewc::{InstallOptions, PackageManager};
use colored::Colorize;
use std::time::Instant;

pub async fn install(pm: &PackageManager, names: &[String], options: &InstallOptions) -> usize {
    let mut failed = 0;

    for name in names {
        banner("Installing", name);
        let started = Instant::now();
        let result = match discover(pm, name, options).await {
            Ok(tree) => pm.install_tree(&tree, options).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(report) if report.already_installed => {
                println!("  {} {} is already installed", "✓".green(), name.bold());
            }
            Ok(mut report) => {
                report.elapsed = started.elapsed();
                print_report(&report, "installed");
            }
            Err(e) => {
                report_root_failure(name, &e);
                failed += 1;
            }
        }
    }

    failed
}
