use super::{banner, discover, print_report, report_root_failure};
use brewc::{InstallOptions, PackageManager};
use std::time::Instant;

/// Download bottles and manifests without installing anything
pub async fn fetch(pm: &PackageManager, names: &[String], options: &InstallOptions) -> usize {
    let mut failed = 0;

    for name in names {
        banner("Fetching", name);
        let started = Instant::now();
        let result = match discover(pm, name, options).await {
            Ok(tree) => pm.fetch_tree(&tree).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(mut report) => {
                report.elapsed = started.elapsed();
                print_report(&report, "fetched");
            }
            Err(e) => {
                report_root_failure(name, &e);
                failed += 1;
            }
        }
    }

    failed
}
