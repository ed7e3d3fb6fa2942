use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const CHECK_USER_LOG: &str = "user_log";
pub const CHECK_SYSTEM_LOG: &str = "system_log";
pub const CHECK_RESOURCES: &str = "resource_usage";
pub const CHECK_EVENT_LOG: &str = "event_log";

pub const NO_ANOMALIES: &str = "No anomalies found";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportReport {
    pub id: String,
    pub timestamp: String,
    pub sources: SourceInfo,
    pub summary: ReportSummary,
    pub checks: Vec<CheckResult>,
    pub recommendations: Vec<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SystemSnapshot>,
}

impl SupportReport {
    pub fn new(
        id: impl Into<String>,
        timestamp: impl Into<String>,
        sources: SourceInfo,
        checks: Vec<CheckResult>,
        extra_recommendations: &[String],
    ) -> Self {
        let summary = summarize_checks(&checks);
        let recommendations = recommend(&checks, extra_recommendations);
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            sources,
            summary,
            checks,
            recommendations,
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: SystemSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.checks.iter().flat_map(|c| c.findings.iter())
    }
}

fn summarize_checks(checks: &[CheckResult]) -> ReportSummary {
    let mut counts = FindingCounts::default();
    for finding in checks.iter().flat_map(|c| c.findings.iter()) {
        match finding {
            Finding::SoftwareConflict { .. } => counts.user_issues += 1,
            Finding::SystemError { .. } => counts.system_errors += 1,
            Finding::HighResourceUsage { .. } => counts.resource_flags += 1,
            Finding::ApplicationCrash { .. } => counts.anomalies += 1,
        }
    }
    let errored = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Error)
        .count();

    let status = if errored > 0 {
        ReportStatus::Fail
    } else if counts.total() > 0 {
        ReportStatus::Warn
    } else {
        ReportStatus::Pass
    };

    let text = if status == ReportStatus::Pass {
        format!("{NO_ANOMALIES}.")
    } else {
        let mut text = format!(
            "Found {} user issues, {} system errors, {} resource flags, {} anomalies.",
            counts.user_issues, counts.system_errors, counts.resource_flags, counts.anomalies
        );
        if errored > 0 {
            let noun = if errored == 1 { "check" } else { "checks" };
            text.push_str(&format!(" {errored} {noun} could not run."));
        }
        text
    };

    ReportSummary {
        status,
        counts,
        text,
    }
}

fn recommend(checks: &[CheckResult], extra: &[String]) -> Vec<Recommendation> {
    let mut out = Vec::new();
    for check in checks {
        let description = match check.status {
            CheckStatus::Error => match check.name.as_str() {
                CHECK_RESOURCES => "Collect resource usage manually on the affected machine",
                _ => "Ask the user to provide the missing or unreadable log file",
            },
            CheckStatus::Warn => match check.name.as_str() {
                CHECK_USER_LOG => "Update or remove conflicting software",
                CHECK_SYSTEM_LOG => "Run compatibility checks for the reported error codes",
                CHECK_RESOURCES => "Investigate high resource usage",
                CHECK_EVENT_LOG => "Review crashing applications and reinstall if needed",
                _ => continue,
            },
            CheckStatus::Pass | CheckStatus::Skipped => continue,
        };
        out.push(Recommendation {
            description: description.to_string(),
            check: Some(check.name.clone()),
        });
    }
    out.extend(extra.iter().map(|description| Recommendation {
        description: description.clone(),
        check: None,
    }));
    out
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceInfo {
    pub user_log: PathBuf,
    pub system_log: PathBuf,
    pub event_log: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub status: ReportStatus,
    pub counts: FindingCounts,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FindingCounts {
    pub user_issues: usize,
    pub system_errors: usize,
    pub resource_flags: usize,
    pub anomalies: usize,
}

impl FindingCounts {
    pub fn total(&self) -> usize {
        self.user_issues + self.system_errors + self.resource_flags + self.anomalies
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pass,
    Fail,
    Warn,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportStatus::Pass => "pass",
            ReportStatus::Fail => "fail",
            ReportStatus::Warn => "warn",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub details: String,
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl CheckResult {
    /// Builds a result whose status follows from the findings.
    pub fn from_findings(
        name: &str,
        source: Option<PathBuf>,
        findings: Vec<Finding>,
        found: impl FnOnce(usize) -> String,
    ) -> Self {
        let (status, details) = if findings.is_empty() {
            (CheckStatus::Pass, NO_ANOMALIES.to_string())
        } else {
            (CheckStatus::Warn, found(findings.len()))
        };
        Self {
            name: name.to_string(),
            status,
            details,
            source,
            findings,
        }
    }

    pub fn error(name: &str, source: Option<PathBuf>, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            details: details.into(),
            source,
            findings: Vec::new(),
        }
    }

    pub fn skipped(name: &str, source: Option<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Skipped,
            details: "disabled in configuration".to_string(),
            source,
            findings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Error,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "issue_type", rename_all = "snake_case")]
pub enum Finding {
    SoftwareConflict {
        line: usize,
        description: String,
    },
    SystemError {
        line: usize,
        error_code: String,
        description: String,
    },
    HighResourceUsage {
        resource: Resource,
        value: f64,
        threshold: f64,
    },
    ApplicationCrash {
        event_id: Option<String>,
        provider: Option<String>,
        time_created: Option<String>,
        description: String,
    },
}

impl Finding {
    /// Human-readable label for the finding category.
    pub fn issue_type(&self) -> &'static str {
        match self {
            Finding::SoftwareConflict { .. } => "Software Conflict",
            Finding::SystemError { .. } => "System Error",
            Finding::HighResourceUsage { .. } => "High Resource Usage",
            Finding::ApplicationCrash { .. } => "Application Crash",
        }
    }

    pub fn description(&self) -> String {
        match self {
            Finding::SoftwareConflict { description, .. }
            | Finding::SystemError { description, .. }
            | Finding::ApplicationCrash { description, .. } => description.clone(),
            Finding::HighResourceUsage {
                resource,
                value,
                threshold,
            } => format!("High {resource} usage: {value:.1}% (threshold {threshold:.1}%)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Cpu,
    Memory,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Cpu => "CPU",
            Resource::Memory => "Memory",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub description: String,
    pub check: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
