pub mod analyzers;
pub mod config;
pub mod error;
pub mod events;
pub mod logs;
pub mod render;
pub mod report;
pub mod resources;
pub mod snapshot;

pub use analyzers::{default_run_id, run_diagnostics, run_diagnostics_with, DiagnosticOptions};
pub use config::{AnalyzerToggles, ProbeMode, SupportConfig};
pub use error::SupportError;
pub use render::{
    render_json, render_markdown, write_markdown, write_reports, MarkdownReport, WrittenReports,
};
pub use report::{
    CheckResult, CheckStatus, Finding, FindingCounts, Recommendation, ReportStatus, ReportSummary,
    Resource, SourceInfo, SupportReport, SystemSnapshot,
};
pub use resources::{ProcProbe, ResourceProbe, ResourceSample, StaticProbe};
