//! Fleet configuration
//!
//! Built once at startup and shared read-only by every session.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};

/// Ingestion API root every request path is appended to
pub const DEFAULT_API_ROOT: &str = "https://datacollector.dripstat.com/agent/v1";

/// Offset added to a session index to form its synthetic process id
pub const PID_BASE: u64 = 12345;

/// Fleet-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// License key sent until a session holds an auth token
    pub license_key: String,

    /// Base URL of the ingestion API
    pub api_root: String,

    /// Number of sessions to launch
    pub fleet_size: usize,

    /// Index of the first session
    pub start_index: u64,

    /// Heap capacity every session reports
    pub heap: HeapSize,

    /// Dump full HTTP traffic to the session log
    pub debug: bool,

    /// Reporting period in seconds
    pub report_interval_secs: u64,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Upper bound of the startup jitter in milliseconds
    pub max_jitter_ms: u64,

    /// Prefix of each session's application name
    pub app_prefix: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            license_key: String::new(),
            api_root: DEFAULT_API_ROOT.to_string(),
            fleet_size: 1,
            start_index: 1,
            heap: HeapSize::gib(512),
            debug: false,
            report_interval_secs: 60,
            request_timeout_secs: 60,
            max_jitter_ms: 100,
            app_prefix: "guava".to_string(),
        }
    }
}

impl FleetConfig {
    /// Reject configurations no session could run with
    pub fn validate(&self) -> Result<()> {
        if self.license_key.trim().is_empty() {
            return Err(FleetError::Config("License key required".to_string()));
        }
        if !(self.api_root.starts_with("http://") || self.api_root.starts_with("https://")) {
            return Err(FleetError::Config(format!(
                "API root must be an http(s) URL: {}",
                self.api_root
            )));
        }
        if self.report_interval_secs == 0 {
            return Err(FleetError::Config(
                "Report interval must be at least one second".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(FleetError::Config(
                "Request timeout must be at least one second".to_string(),
            ));
        }
        let last_pid = self
            .start_index
            .checked_add(self.fleet_size as u64)
            .and_then(|end| end.checked_add(PID_BASE));
        if last_pid.is_none() {
            return Err(FleetError::Config(format!(
                "{} sessions starting at {} run past the largest index",
                self.fleet_size, self.start_index
            )));
        }
        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }

    /// Display name of the session at `index`
    pub fn app_name(&self, index: u64) -> String {
        format!("{}{}", self.app_prefix, index)
    }

    /// Synthetic process id of the session at `index`
    pub fn pid(index: u64) -> u64 {
        PID_BASE + index
    }

    /// Absolute URL for an API path such as `/init`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_root.trim_end_matches('/'), path)
    }
}

/// A byte quantity parsed from strings like `"512 GB"` or `"1.5g"`
///
/// Units are powers of 1024 and case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeapSize(u64);

impl HeapSize {
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn gib(n: u64) -> Self {
        Self(n << 30)
    }

    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// Initial heap reported at registration
    pub const fn initial(self) -> u64 {
        self.0 / 10
    }
}

impl FromStr for HeapSize {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        let split = input
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(input.len());
        let (number, unit) = input.split_at(split);

        let value: f64 = number
            .parse()
            .map_err(|_| FleetError::InvalidHeapSize(s.to_string()))?;

        let shift = match unit.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 0,
            "K" | "KB" => 10,
            "M" | "MB" => 20,
            "G" | "GB" => 30,
            "T" | "TB" => 40,
            "P" | "PB" => 50,
            _ => return Err(FleetError::InvalidHeapSize(s.to_string())),
        };

        let bytes = value * (1u64 << shift) as f64;
        if !bytes.is_finite() || bytes >= u64::MAX as f64 {
            return Err(FleetError::InvalidHeapSize(s.to_string()));
        }

        Ok(Self(bytes as u64))
    }
}

impl fmt::Display for HeapSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
        let mut value = self.0 as f64;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        if value.fract() == 0.0 {
            write!(f, "{} {}", value as u64, UNITS[unit])
        } else {
            write!(f, "{:.2} {}", value, UNITS[unit])
        }
    }
}
