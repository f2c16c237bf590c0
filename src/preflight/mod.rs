//! Pre-flight checks.
//!
//! Looks at everything a build needs before any stage runs and reports it
//! without failing. Run with `apkbuild preflight`. For a hard stop use
//! [`BuildConfig::validate`].

mod checks;
mod types;

use crate::config::BuildConfig;

pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all pre-flight checks against `config`.
pub fn run_preflight(config: &BuildConfig) -> PreflightReport {
    let mut report = PreflightReport::default();

    tracing::info!("Checking SDK and Java locations...");
    report.checks.extend(checks::check_roots(config));

    tracing::info!("Checking platform...");
    report.checks.extend(checks::check_platform(config));

    tracing::info!("Checking tools...");
    report.checks.extend(checks::check_tools(config));

    tracing::info!("Checking signing key...");
    report.checks.push(checks::check_keystore(config));

    report
}
