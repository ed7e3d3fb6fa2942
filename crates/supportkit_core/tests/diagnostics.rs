use std::fs;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use supportkit_core::report::{CHECK_EVENT_LOG, CHECK_RESOURCES, CHECK_SYSTEM_LOG, CHECK_USER_LOG};
use supportkit_core::{
    render_json, render_markdown, run_diagnostics_with, write_reports, CheckStatus,
    DiagnosticOptions, Finding, ReportStatus, ResourceSample, StaticProbe, SupportConfig,
    SupportReport,
};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn config() -> SupportConfig {
    let mut config = SupportConfig::default();
    config.analyzers.snapshot = Some(false);
    config
}

fn options(base_dir: PathBuf) -> DiagnosticOptions {
    DiagnosticOptions::new(base_dir, "run-fixture")
        .with_timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 9, 15, 30).unwrap())
}

fn busy_probe() -> StaticProbe {
    StaticProbe(ResourceSample {
        cpu_percent: 93.5,
        memory_percent: 40.0,
    })
}

fn idle_probe() -> StaticProbe {
    StaticProbe(ResourceSample {
        cpu_percent: 3.0,
        memory_percent: 20.0,
    })
}

#[test]
fn fixture_run_finds_every_category() {
    let report = run_diagnostics_with(&config(), &options(fixtures()), &busy_probe()).unwrap();

    assert_eq!(report.summary.status, ReportStatus::Warn);
    assert_eq!(
        report.summary.text,
        "Found 2 user issues, 2 system errors, 1 resource flags, 2 anomalies."
    );
    for name in [CHECK_USER_LOG, CHECK_SYSTEM_LOG, CHECK_RESOURCES, CHECK_EVENT_LOG] {
        assert_eq!(report.check(name).unwrap().status, CheckStatus::Warn, "{name}");
    }

    let codes: Vec<_> = report
        .check(CHECK_SYSTEM_LOG)
        .unwrap()
        .findings
        .iter()
        .filter_map(|f| match f {
            Finding::SystemError { error_code, .. } => Some(error_code.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(codes, vec!["E1001", "0x80070005"]);
    assert_eq!(report.timestamp, "2024-05-01T09:15:30+00:00");
}

#[test]
fn json_and_markdown_carry_the_same_findings() {
    let report = run_diagnostics_with(&config(), &options(fixtures()), &busy_probe()).unwrap();
    let json = render_json(&report).unwrap();
    let markdown = render_markdown(&report);

    let decoded: SupportReport = serde_json::from_str(&json).unwrap();
    let from_json: Vec<Finding> = decoded.findings().cloned().collect();
    let original: Vec<Finding> = report.findings().cloned().collect();
    assert_eq!(from_json, original);
    assert_eq!(original.len(), 7);

    for finding in &original {
        let description = finding.description();
        assert!(
            markdown.contains(&description),
            "markdown is missing {description:?}"
        );
    }
    assert!(markdown.contains(&report.summary.text));
}

#[test]
fn missing_files_are_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let report =
        run_diagnostics_with(&config(), &options(dir.path().to_path_buf()), &idle_probe()).unwrap();

    for name in [CHECK_USER_LOG, CHECK_SYSTEM_LOG, CHECK_EVENT_LOG] {
        let check = report.check(name).unwrap();
        assert_eq!(check.status, CheckStatus::Error, "{name}");
        assert!(check.details.starts_with("file not found: "), "{}", check.details);
    }
    assert_eq!(report.summary.status, ReportStatus::Fail);
    assert!(report.summary.text.ends_with("3 checks could not run."));

    let markdown = render_markdown(&report);
    assert!(markdown.contains("- **Error:** file not found: "));
}

#[test]
fn empty_logs_report_no_anomalies() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["user_log.txt", "system_log.txt", "event_log.xml"] {
        fs::write(dir.path().join(name), "").unwrap();
    }
    let report =
        run_diagnostics_with(&config(), &options(dir.path().to_path_buf()), &idle_probe()).unwrap();

    assert_eq!(report.summary.status, ReportStatus::Pass);
    assert_eq!(report.summary.text, "No anomalies found.");
    assert!(report.checks.iter().all(|c| c.status == CheckStatus::Pass));
    assert!(report.recommendations.is_empty());

    let markdown = render_markdown(&report);
    assert!(markdown.contains("## User Issues\n\nNo anomalies found.\n"));
    assert!(markdown.contains("## Resource Flags\n\nNo anomalies found. CPU 3.0%, memory 20.0%; within thresholds.\n"));
}

#[test]
fn malformed_event_log_only_fails_its_own_check() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixtures().join("user_log.txt"), dir.path().join("user_log.txt")).unwrap();
    fs::copy(fixtures().join("system_log.txt"), dir.path().join("system_log.txt")).unwrap();
    fs::write(
        dir.path().join("event_log.xml"),
        "<Events><Event><System></Event></Events>",
    )
    .unwrap();

    let report =
        run_diagnostics_with(&config(), &options(dir.path().to_path_buf()), &idle_probe()).unwrap();
    let events = report.check(CHECK_EVENT_LOG).unwrap();
    assert_eq!(events.status, CheckStatus::Error);
    assert!(events.details.starts_with("malformed event log:"), "{}", events.details);
    assert_eq!(report.check(CHECK_USER_LOG).unwrap().findings.len(), 2);
    assert_eq!(report.summary.counts.system_errors, 2);
}

#[test]
fn plain_text_event_log_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixtures().join("user_log.txt"), dir.path().join("user_log.txt")).unwrap();
    fs::copy(fixtures().join("system_log.txt"), dir.path().join("system_log.txt")).unwrap();
    fs::write(
        dir.path().join("event_log.xml"),
        "2024-05-01 09:10:02 app crash detected\n2024-05-01 09:12:40 service restarted\n",
    )
    .unwrap();

    let report =
        run_diagnostics_with(&config(), &options(dir.path().to_path_buf()), &busy_probe()).unwrap();
    let events = report.check(CHECK_EVENT_LOG).unwrap();
    assert_eq!(events.status, CheckStatus::Error);
    assert!(events.details.starts_with("malformed event log:"), "{}", events.details);
    assert!(events.findings.is_empty());
    assert_eq!(report.summary.status, ReportStatus::Fail);
    for name in [CHECK_USER_LOG, CHECK_SYSTEM_LOG, CHECK_RESOURCES] {
        assert_eq!(report.check(name).unwrap().status, CheckStatus::Warn, "{name}");
    }
}

#[test]
fn reports_are_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_diagnostics_with(&config(), &options(fixtures()), &busy_probe()).unwrap();
    let json_path = dir.path().join("out/support_report.json");
    let md_path = dir.path().join("out/support_report.md");

    let written = write_reports(&report, &json_path, &md_path).unwrap();
    assert_eq!(written.json, json_path);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["summary"]["counts"]["anomalies"], 2);
    assert_eq!(json["checks"][0]["name"], "user_log");
    assert_eq!(
        json["checks"][0]["findings"][0]["issue_type"],
        "software_conflict"
    );
    let markdown = fs::read_to_string(&md_path).unwrap();
    assert!(markdown.starts_with("# Remote IT Support Report\n"));
}

#[test]
fn configured_paths_and_recommendations_are_used() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("client.log"), "Driver conflict on COM3\n").unwrap();
    let mut config: SupportConfig = toml::from_str(
        r#"
        recommendations = ["Schedule a follow-up call"]

        [sources]
        user_log = "client.log"

        [analyzers]
        system_log = false
        event_log = false
        snapshot = false
        "#,
    )
    .unwrap();
    config.resources.cpu_threshold = 95.0;

    let report =
        run_diagnostics_with(&config, &options(dir.path().to_path_buf()), &busy_probe()).unwrap();
    assert_eq!(report.check(CHECK_USER_LOG).unwrap().findings.len(), 1);
    assert_eq!(report.check(CHECK_SYSTEM_LOG).unwrap().status, CheckStatus::Skipped);
    assert_eq!(report.check(CHECK_RESOURCES).unwrap().status, CheckStatus::Pass);
    let recs: Vec<_> = report
        .recommendations
        .iter()
        .map(|r| r.description.as_str())
        .collect();
    assert_eq!(
        recs,
        vec![
            "Update or remove conflicting software",
            "Schedule a follow-up call"
        ]
    );
}
