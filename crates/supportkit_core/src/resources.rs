//! CPU and memory usage probes plus the threshold check.

use std::fs;
use std::thread;
use std::time::Duration;

use crate::config::{ProbeMode, ResourceConfig};
use crate::error::{Result, SupportError};
use crate::report::{Finding, Resource};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

pub trait ResourceProbe {
    fn sample(&self) -> Result<ResourceSample>;
}

/// Reads `/proc/stat` and `/proc/meminfo` on Linux hosts.
pub struct ProcProbe {
    pub interval: Duration,
}

impl ResourceProbe for ProcProbe {
    fn sample(&self) -> Result<ResourceSample> {
        let first = read_proc("/proc/stat").and_then(|s| parse_cpu_times(&s))?;
        thread::sleep(self.interval);
        let second = read_proc("/proc/stat").and_then(|s| parse_cpu_times(&s))?;
        let memory = read_proc("/proc/meminfo").and_then(|s| parse_memory_percent(&s))?;
        Ok(ResourceSample {
            cpu_percent: first.busy_percent_until(&second),
            memory_percent: memory,
        })
    }
}

/// Reports fixed figures, for hosts without `/proc` and for tests.
pub struct StaticProbe(pub ResourceSample);

impl ResourceProbe for StaticProbe {
    fn sample(&self) -> Result<ResourceSample> {
        Ok(self.0)
    }
}

pub fn probe_from_config(config: &ResourceConfig) -> Box<dyn ResourceProbe> {
    match config.mode {
        ProbeMode::Live => Box::new(ProcProbe {
            interval: Duration::from_millis(config.sample_interval_ms),
        }),
        ProbeMode::Static => Box::new(StaticProbe(ResourceSample {
            cpu_percent: config.static_cpu,
            memory_percent: config.static_memory,
        })),
    }
}

/// Flags each figure strictly above its threshold.
pub fn check_thresholds(
    sample: &ResourceSample,
    cpu_threshold: f64,
    memory_threshold: f64,
) -> Vec<Finding> {
    [
        (Resource::Cpu, sample.cpu_percent, cpu_threshold),
        (Resource::Memory, sample.memory_percent, memory_threshold),
    ]
    .into_iter()
    .filter(|(_, value, threshold)| value > threshold)
    .map(|(resource, value, threshold)| Finding::HighResourceUsage {
        resource,
        value,
        threshold,
    })
    .collect()
}

fn read_proc(path: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| SupportError::ResourceUnavailable(format!("{path}: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

impl CpuTimes {
    pub fn busy_percent_until(&self, later: &CpuTimes) -> f64 {
        let total = later.total.saturating_sub(self.total);
        if total == 0 {
            return 0.0;
        }
        let idle = later.idle.saturating_sub(self.idle).min(total);
        (total - idle) as f64 * 100.0 / total as f64
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
pub fn parse_cpu_times(stat: &str) -> Result<CpuTimes> {
    let line = stat
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| SupportError::ResourceUnavailable("no cpu line in /proc/stat".into()))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|f| f.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| SupportError::ResourceUnavailable(format!("bad /proc/stat field: {e}")))?;
    if fields.len() < 4 {
        return Err(SupportError::ResourceUnavailable(
            "truncated cpu line in /proc/stat".into(),
        ));
    }
    // user nice system idle iowait irq softirq steal; guest time is already in user.
    let total: u64 = fields.iter().take(8).sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(CpuTimes { idle, total })
}

/// Used memory as a percentage, from `MemTotal` and `MemAvailable`.
pub fn parse_memory_percent(meminfo: &str) -> Result<f64> {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find_map(|l| l.strip_prefix(name)?.strip_prefix(':'))
            .and_then(|rest| rest.split_whitespace().next()?.parse().ok())
    };
    let total = field("MemTotal")
        .filter(|t| *t > 0)
        .ok_or_else(|| SupportError::ResourceUnavailable("MemTotal missing".into()))?;
    let available = field("MemAvailable")
        .ok_or_else(|| SupportError::ResourceUnavailable("MemAvailable missing".into()))?;
    Ok(total.saturating_sub(available) as f64 * 100.0 / total as f64)
}
