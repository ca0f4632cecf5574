use super::{banner, discover, print_report, report_root_failure};
use brewc::{InstallOptions, PackageManager};
use std::time::Instant;

pub async fn reinstall(pm: &PackageManager, names: &[String]) -> usize {
    let options = InstallOptions::default();
    let mut failed = 0;

    for name in names {
        banner("Reinstalling", name);
        let started = Instant::now();
        let result = match discover(pm, name, &options).await {
            Ok(tree) => pm.reinstall_tree(&tree).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(mut report) => {
                report.elapsed = started.elapsed();
                print_report(&report, "reinstalled");
            }
            Err(e) => {
                report_root_failure(name, &e);
                failed += 1;
            }
        }
    }

    failed
}
