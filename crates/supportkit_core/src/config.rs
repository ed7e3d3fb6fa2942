use std::fs;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::error::{Result, SupportError};

pub const DEFAULT_CONFIG_FILE: &str = "supportkit.toml";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SupportConfig {
    #[serde(default)]
    pub sources: SourceConfig,
    #[serde(default)]
    pub analyzers: AnalyzerToggles,
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl SupportConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| SupportError::from_read(path, e))?;
        toml::from_str(&data).map_err(|source| SupportError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `supportkit.toml` from `dir` when present, defaults otherwise.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            Self::from_path(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn source_info(&self) -> crate::report::SourceInfo {
        crate::report::SourceInfo {
            user_log: self.sources.user_log.clone(),
            system_log: self.sources.system_log.clone(),
            event_log: self.sources.event_log.clone(),
        }
    }

    /// Checks everything that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<()> {
        self.patterns.user_issue_matcher()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_user_log")]
    pub user_log: PathBuf,
    #[serde(default = "default_system_log")]
    pub system_log: PathBuf,
    #[serde(default = "default_event_log")]
    pub event_log: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            user_log: default_user_log(),
            system_log: default_system_log(),
            event_log: default_event_log(),
        }
    }
}

fn default_user_log() -> PathBuf {
    PathBuf::from("user_log.txt")
}

fn default_system_log() -> PathBuf {
    PathBuf::from("system_log.txt")
}

fn default_event_log() -> PathBuf {
    PathBuf::from("event_log.xml")
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AnalyzerToggles {
    #[serde(default)]
    pub user_log: Option<bool>,
    #[serde(default)]
    pub system_log: Option<bool>,
    #[serde(default)]
    pub resources: Option<bool>,
    #[serde(default)]
    pub event_log: Option<bool>,
    #[serde(default)]
    pub snapshot: Option<bool>,
}

impl AnalyzerToggles {
    pub fn user_log_enabled(&self) -> bool {
        self.user_log.unwrap_or(true)
    }
    pub fn system_log_enabled(&self) -> bool {
        self.system_log.unwrap_or(true)
    }
    pub fn resources_enabled(&self) -> bool {
        self.resources.unwrap_or(true)
    }
    pub fn event_log_enabled(&self) -> bool {
        self.event_log.unwrap_or(true)
    }
    pub fn snapshot_enabled(&self) -> bool {
        self.snapshot.unwrap_or(true)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatternConfig {
    /// Regular expressions matched case-insensitively against user log lines.
    #[serde(default = "default_user_issues")]
    pub user_issues: Vec<String>,
    #[serde(default = "default_system_error_marker")]
    pub system_error_marker: String,
    #[serde(default = "default_error_code_len")]
    pub error_code_len: usize,
    #[serde(default = "default_crash_keywords")]
    pub crash_keywords: Vec<String>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            user_issues: default_user_issues(),
            system_error_marker: default_system_error_marker(),
            error_code_len: default_error_code_len(),
            crash_keywords: default_crash_keywords(),
        }
    }
}

impl PatternConfig {
    /// Builds one case-insensitive alternation out of `user_issues`.
    ///
    /// Each pattern is compiled on its own first so a bad entry is reported
    /// by name rather than as a fragment of the combined expression.
    pub fn user_issue_matcher(&self) -> Result<Option<Regex>> {
        if self.user_issues.is_empty() {
            return Ok(None);
        }
        let mut alternatives = Vec::with_capacity(self.user_issues.len());
        for pattern in &self.user_issues {
            compile(pattern)?;
            alternatives.push(format!("(?:{pattern})"));
        }
        compile(&alternatives.join("|")).map(Some)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| SupportError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn default_user_issues() -> Vec<String> {
    vec![
        "conflict".to_string(),
        "error".to_string(),
        "failed to load".to_string(),
    ]
}

fn default_system_error_marker() -> String {
    "ERROR".to_string()
}

fn default_error_code_len() -> usize {
    10
}

fn default_crash_keywords() -> Vec<String> {
    vec!["crash".to_string()]
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    #[default]
    Live,
    Static,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResourceConfig {
    #[serde(default)]
    pub mode: ProbeMode,
    #[serde(default = "default_threshold")]
    pub cpu_threshold: f64,
    #[serde(default = "default_threshold")]
    pub memory_threshold: f64,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// Figures reported by the static probe.
    #[serde(default)]
    pub static_cpu: f64,
    #[serde(default)]
    pub static_memory: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            mode: ProbeMode::default(),
            cpu_threshold: default_threshold(),
            memory_threshold: default_threshold(),
            sample_interval_ms: default_sample_interval_ms(),
            static_cpu: 0.0,
            static_memory: 0.0,
        }
    }
}

fn default_threshold() -> f64 {
    80.0
}

fn default_sample_interval_ms() -> u64 {
    250
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_json_path")]
    pub json_path: PathBuf,
    #[serde(default = "default_markdown_path")]
    pub markdown_path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            json_path: default_json_path(),
            markdown_path: default_markdown_path(),
        }
    }
}

fn default_json_path() -> PathBuf {
    PathBuf::from("support_report.json")
}

fn default_markdown_path() -> PathBuf {
    PathBuf::from("support_report.md")
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub trace_filter: Option<String>,
}
