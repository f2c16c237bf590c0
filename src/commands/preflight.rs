//! Preflight command - runs pre-flight checks.

use anyhow::{bail, Result};

use apkbuild::config::BuildConfig;
use apkbuild::preflight;

/// Execute the preflight command.
pub fn cmd_preflight(config: &BuildConfig, strict: bool) -> Result<()> {
    let report = preflight::run_preflight(config);
    report.print();

    if report.all_passed() {
        println!("All pre-flight checks passed!");
    } else if strict {
        bail!(
            "Pre-flight failed: {} check(s) failed. Fix the issues above before building.",
            report.fail_count()
        );
    } else {
        println!("Some checks failed. Use --strict to exit with an error.");
    }
    Ok(())
}
