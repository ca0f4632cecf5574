use super::{banner, print_report, report_root_failure};
use brewc::{PackageManager, UninstallMode};

pub async fn uninstall(pm: &PackageManager, names: &[String], mode: UninstallMode) -> usize {
    let mut failed = 0;

    for name in names {
        banner("Uninstalling", name);
        match pm.uninstall(name, mode).await {
            Ok(report) => print_report(&report, "uninstalled"),
            Err(e) => {
                report_root_failure(name, &e);
                failed += 1;
            }
        }
    }

    failed
}
