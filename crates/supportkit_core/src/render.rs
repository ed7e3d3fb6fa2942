//! JSON and Markdown renderings of a [`SupportReport`].
//!
//! Both renderings are produced from the same report value, so a finding
//! present in one is always present in the other.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SupportError};
use crate::report::{
    CheckResult, CheckStatus, Finding, SupportReport, SystemSnapshot, CHECK_EVENT_LOG,
    CHECK_RESOURCES, CHECK_SYSTEM_LOG, CHECK_USER_LOG, NO_ANOMALIES,
};

pub const REPORT_TITLE: &str = "Remote IT Support Report";

pub fn render_json(report: &SupportReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn render_markdown(report: &SupportReport) -> String {
    MarkdownReport(report).to_string()
}

/// Markdown view of a report; `to_string` gives the full document.
pub struct MarkdownReport<'a>(pub &'a SupportReport);

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(out, "# {REPORT_TITLE}\n")?;
        writeln!(out, "- **Run:** {}", report.id)?;
        writeln!(out, "- **Generated:** {}", report.timestamp)?;
        writeln!(out, "- **Status:** {}", report.summary.status)?;

        writeln!(out, "\n## Summary\n\n{}", report.summary.text)?;

        let sources = &report.sources;
        writeln!(out, "\n## Sources\n")?;
        writeln!(out, "- User log: `{}`", sources.user_log.display())?;
        writeln!(out, "- System log: `{}`", sources.system_log.display())?;
        writeln!(out, "- Event log: `{}`", sources.event_log.display())?;

        for check in &report.checks {
            writeln!(out, "\n## {}\n", section_title(&check.name))?;
            write_check(out, check)?;
        }

        if !report.recommendations.is_empty() {
            writeln!(out, "\n## Recommendations\n")?;
            for rec in &report.recommendations {
                writeln!(out, "- {}", rec.description)?;
            }
        }

        if let Some(snapshot) = &report.snapshot {
            write_snapshot(out, snapshot)?;
        }
        Ok(())
    }
}

fn section_title(check: &str) -> &str {
    match check {
        CHECK_USER_LOG => "User Issues",
        CHECK_SYSTEM_LOG => "System Errors",
        CHECK_RESOURCES => "Resource Flags",
        CHECK_EVENT_LOG => "Detected Anomalies",
        other => other,
    }
}

fn write_check(out: &mut impl fmt::Write, check: &CheckResult) -> fmt::Result {
    match check.status {
        CheckStatus::Skipped => writeln!(out, "_Skipped: {}._", check.details),
        CheckStatus::Error => {
            let mut lines = check.details.lines();
            writeln!(out, "- **Error:** {}", lines.next().unwrap_or_default())?;
            let rest: Vec<&str> = lines.collect();
            if rest.is_empty() {
                return Ok(());
            }
            write_block(out, &rest.join("\n"))
        }
        CheckStatus::Pass if check.findings.is_empty() => {
            if check.details == NO_ANOMALIES {
                writeln!(out, "{NO_ANOMALIES}.")
            } else {
                writeln!(out, "{NO_ANOMALIES}. {}.", check.details)
            }
        }
        CheckStatus::Pass | CheckStatus::Warn => {
            for finding in &check.findings {
                writeln!(out, "{}", finding_line(finding))?;
            }
            Ok(())
        }
    }
}

fn finding_line(finding: &Finding) -> String {
    match finding {
        Finding::SoftwareConflict { line, description } => {
            format!(
                "- **Type:** {} - line {line}: {description}",
                finding.issue_type()
            )
        }
        Finding::SystemError {
            line,
            error_code,
            description,
        } => format!("- **Code:** {error_code} - line {line}: {description}"),
        Finding::HighResourceUsage { .. } => format!("- **Issue:** {}", finding.description()),
        Finding::ApplicationCrash {
            event_id,
            provider,
            time_created,
            description,
        } => {
            let line = format!(
                "- **Event ID:** {} - {description}",
                event_id.as_deref().unwrap_or("unknown")
            );
            let context: Vec<String> = [
                provider.as_ref().map(|p| format!("provider: {p}")),
                time_created.as_ref().map(|t| format!("time: {t}")),
            ]
            .into_iter()
            .flatten()
            .collect();
            if context.is_empty() {
                line
            } else {
                format!("{line} ({})", context.join(", "))
            }
        }
    }
}

fn write_snapshot(out: &mut impl fmt::Write, snapshot: &SystemSnapshot) -> fmt::Result {
    writeln!(out, "\n## System Snapshot")?;
    if let Some(error) = &snapshot.error {
        writeln!(out, "\n_{}_", error)?;
    }
    for (title, body) in [
        ("Processes", &snapshot.processes),
        ("Connections", &snapshot.connections),
    ] {
        if let Some(body) = body {
            writeln!(out, "\n### {title}\n")?;
            write_block(out, body)?;
        }
    }
    Ok(())
}

/// Fenced code block, with a fence longer than any backtick run in `body`.
fn write_block(out: &mut impl fmt::Write, body: &str) -> fmt::Result {
    let longest = body
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    writeln!(out, "{fence}text\n{}\n{fence}", body.trim_end())
}

#[derive(Debug, Clone)]
pub struct WrittenReports {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Writes both renderings, creating parent directories as needed.
pub fn write_reports(
    report: &SupportReport,
    json_path: &Path,
    markdown_path: &Path,
) -> Result<WrittenReports> {
    write_file(json_path, &render_json(report)?)?;
    write_file(markdown_path, &render_markdown(report))?;
    tracing::info!(
        json = %json_path.display(),
        markdown = %markdown_path.display(),
        "reports written"
    );
    Ok(WrittenReports {
        json: json_path.to_path_buf(),
        markdown: markdown_path.to_path_buf(),
    })
}

/// Writes the Markdown rendering alone, creating parent directories as needed.
pub fn write_markdown(report: &SupportReport, path: &Path) -> Result<PathBuf> {
    write_file(path, &render_markdown(report))?;
    tracing::info!(markdown = %path.display(), "markdown report written");
    Ok(path.to_path_buf())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    let wrap = |source| SupportError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(wrap)?;
    }
    fs::write(path, contents).map_err(wrap)
}
