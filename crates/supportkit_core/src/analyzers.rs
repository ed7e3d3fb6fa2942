use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::SupportConfig;
use crate::error::{Result, SupportError};
use crate::events::scan_event_log;
use crate::logs::{scan_system_log, scan_user_log};
use crate::report::{
    CheckResult, CheckStatus, Finding, SupportReport, CHECK_EVENT_LOG, CHECK_RESOURCES, CHECK_SYSTEM_LOG,
    CHECK_USER_LOG,
};
use crate::resources::{check_thresholds, probe_from_config, ResourceProbe};
use crate::snapshot::{capture_snapshot, command_excerpt};

pub struct DiagnosticOptions {
    /// Relative source paths are resolved against this directory.
    pub base_dir: PathBuf,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticOptions {
    pub fn new(base_dir: PathBuf, run_id: impl Into<String>) -> Self {
        Self {
            base_dir,
            run_id: run_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

pub fn default_run_id(now: DateTime<Utc>) -> String {
    format!("run-{}", now.format("%Y%m%dT%H%M%S"))
}

pub fn run_diagnostics(config: &SupportConfig, options: &DiagnosticOptions) -> Result<SupportReport> {
    let probe = probe_from_config(&config.resources);
    run_diagnostics_with(config, options, probe.as_ref())
}

/// Runs every enabled check. Only configuration problems are returned as
/// errors; a check that cannot read its input is recorded in the report.
pub fn run_diagnostics_with(
    config: &SupportConfig,
    options: &DiagnosticOptions,
    probe: &dyn ResourceProbe,
) -> Result<SupportReport> {
    let toggles = &config.analyzers;
    let patterns = &config.patterns;
    let matcher = patterns.user_issue_matcher()?;
    let mut checks = Vec::new();

    let user_log = options.resolve(&config.sources.user_log);
    checks.push(if toggles.user_log_enabled() {
        run_user_log(&user_log, matcher.as_ref())
    } else {
        CheckResult::skipped(CHECK_USER_LOG, Some(user_log))
    });

    let system_log = options.resolve(&config.sources.system_log);
    checks.push(if toggles.system_log_enabled() {
        run_system_log(
            &system_log,
            &patterns.system_error_marker,
            patterns.error_code_len,
        )
    } else {
        CheckResult::skipped(CHECK_SYSTEM_LOG, Some(system_log))
    });

    checks.push(if toggles.resources_enabled() {
        run_resources(config, probe)
    } else {
        CheckResult::skipped(CHECK_RESOURCES, None)
    });

    let event_log = options.resolve(&config.sources.event_log);
    checks.push(if toggles.event_log_enabled() {
        run_event_log(&event_log, &patterns.crash_keywords)
    } else {
        CheckResult::skipped(CHECK_EVENT_LOG, Some(event_log))
    });

    for check in &checks {
        log_outcome(check);
    }

    let report = SupportReport::new(
        options.run_id.clone(),
        options.timestamp.to_rfc3339(),
        config.source_info(),
        checks,
        &config.recommendations,
    );

    let report = if toggles.snapshot_enabled() {
        report.with_snapshot(capture_snapshot(config.snapshot.max_chars))
    } else {
        report
    };

    info!(id = %report.id, status = %report.summary.status, "{}", report.summary.text);
    Ok(report)
}

fn run_user_log(path: &Path, matcher: Option<&Regex>) -> CheckResult {
    debug!(path = %path.display(), "scanning user log");
    finish(CHECK_USER_LOG, path, scan_user_log(path, matcher), |n| {
        format!("{n} potential software conflicts")
    })
}

fn run_system_log(path: &Path, marker: &str, code_len: usize) -> CheckResult {
    debug!(path = %path.display(), "scanning system log");
    finish(
        CHECK_SYSTEM_LOG,
        path,
        scan_system_log(path, marker, code_len),
        |n| format!("{n} error lines"),
    )
}

fn run_event_log(path: &Path, keywords: &[String]) -> CheckResult {
    debug!(path = %path.display(), "scanning event log");
    finish(CHECK_EVENT_LOG, path, scan_event_log(path, keywords), |n| {
        format!("{n} application crashes")
    })
}

fn finish(
    name: &str,
    path: &Path,
    outcome: Result<Vec<Finding>>,
    found: impl FnOnce(usize) -> String,
) -> CheckResult {
    match outcome {
        Ok(findings) => CheckResult::from_findings(name, Some(path.to_path_buf()), findings, found),
        Err(err) => CheckResult::error(name, Some(path.to_path_buf()), err.to_string()),
    }
}

fn run_resources(config: &SupportConfig, probe: &dyn ResourceProbe) -> CheckResult {
    let limits = &config.resources;
    match probe.sample() {
        Ok(sample) => {
            debug!(
                cpu = sample.cpu_percent,
                memory = sample.memory_percent,
                "sampled resource usage"
            );
            let findings = check_thresholds(&sample, limits.cpu_threshold, limits.memory_threshold);
            let mut check = CheckResult::from_findings(CHECK_RESOURCES, None, findings, |n| {
                format!("{n} resources above threshold")
            });
            if check.status == CheckStatus::Pass {
                check.details = format!(
                    "CPU {:.1}%, memory {:.1}%; within thresholds",
                    sample.cpu_percent, sample.memory_percent
                );
            }
            check
        }
        Err(err) => CheckResult::error(CHECK_RESOURCES, None, unavailable_details(&err)),
    }
}

/// Appends a `top` excerpt so support still has something to look at.
fn unavailable_details(err: &SupportError) -> String {
    match command_excerpt(&[("top", "-bn1")], 200) {
        Some(top) if !top.trim().is_empty() => format!("{err}\n{}", top.trim_end()),
        _ => err.to_string(),
    }
}

fn log_outcome(check: &CheckResult) {
    match check.status {
        CheckStatus::Error => warn!(check = %check.name, "{}", check.details),
        CheckStatus::Skipped => debug!(check = %check.name, "skipped"),
        CheckStatus::Pass | CheckStatus::Warn => info!(
            check = %check.name,
            findings = check.findings.len(),
            "{}",
            check.details
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ResourceSample, StaticProbe};

    fn idle_probe() -> StaticProbe {
        StaticProbe(ResourceSample {
            cpu_percent: 5.0,
            memory_percent: 30.0,
        })
    }

    fn quiet_config() -> SupportConfig {
        let mut config = SupportConfig::default();
        config.analyzers.snapshot = Some(false);
        config
    }

    #[test]
    fn relative_sources_resolve_against_base_dir() {
        let options = DiagnosticOptions::new(PathBuf::from("/tmp/case-42"), "run");
        assert_eq!(
            options.resolve(Path::new("user_log.txt")),
            PathBuf::from("/tmp/case-42/user_log.txt")
        );
        assert_eq!(
            options.resolve(Path::new("/var/log/syslog")),
            PathBuf::from("/var/log/syslog")
        );
    }

    #[test]
    fn default_run_id_uses_compact_timestamp() {
        let now = DateTime::parse_from_rfc3339("2024-05-01T09:15:30Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(default_run_id(now), "run-20240501T091530");
    }

    #[test]
    fn missing_inputs_do_not_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let options = DiagnosticOptions::new(dir.path().to_path_buf(), "run");
        let report = run_diagnostics_with(&quiet_config(), &options, &idle_probe()).unwrap();

        let statuses: Vec<_> = report.checks.iter().map(|c| (c.name.as_str(), c.status)).collect();
        assert_eq!(
            statuses,
            vec![
                (CHECK_USER_LOG, CheckStatus::Error),
                (CHECK_SYSTEM_LOG, CheckStatus::Error),
                (CHECK_RESOURCES, CheckStatus::Pass),
                (CHECK_EVENT_LOG, CheckStatus::Error),
            ]
        );
        let user = report.check(CHECK_USER_LOG).unwrap();
        assert!(user.details.starts_with("file not found: "), "{}", user.details);
        assert!(report.snapshot.is_none());
    }

    #[test]
    fn disabled_checks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = quiet_config();
        config.analyzers.user_log = Some(false);
        config.analyzers.resources = Some(false);
        let options = DiagnosticOptions::new(dir.path().to_path_buf(), "run");
        let report = run_diagnostics_with(&config, &options, &idle_probe()).unwrap();
        assert_eq!(report.check(CHECK_USER_LOG).unwrap().status, CheckStatus::Skipped);
        assert_eq!(report.check(CHECK_RESOURCES).unwrap().status, CheckStatus::Skipped);
    }

    #[test]
    fn invalid_pattern_is_a_configuration_error() {
        let mut config = quiet_config();
        config.patterns.user_issues = vec!["[".into()];
        let options = DiagnosticOptions::new(PathBuf::from("."), "run");
        let err = run_diagnostics_with(&config, &options, &idle_probe()).unwrap_err();
        assert!(matches!(err, SupportError::InvalidPattern { .. }));
    }

    #[test]
    fn probe_failure_is_recorded() {
        struct Broken;
        impl ResourceProbe for Broken {
            fn sample(&self) -> Result<ResourceSample> {
                Err(SupportError::ResourceUnavailable("no /proc".into()))
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let options = DiagnosticOptions::new(dir.path().to_path_buf(), "run");
        let report = run_diagnostics_with(&quiet_config(), &options, &Broken).unwrap();
        let check = report.check(CHECK_RESOURCES).unwrap();
        assert_eq!(check.status, CheckStatus::Error);
        assert!(check
            .details
            .starts_with("resource usage unavailable: no /proc"));
    }
}
