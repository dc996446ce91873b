//! Wire types of the agent ingestion API
//!
//! All bodies are JSON. Field names follow the backend's camelCase
//! convention except `authtoken`, which the backend spells in lowercase.

use serde::{Deserialize, Serialize};

/// Registration endpoint
pub const INIT_PATH: &str = "/init";

/// Module announcement endpoint
pub const MODULE_UPDATE_PATH: &str = "/moduleUpdate";

/// Metric reporting endpoint
pub const REPORT_PATH: &str = "/v7/data";

/// Static description of the simulated runtime, sent at registration
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    pub agent_version: &'static str,
    pub host: &'static str,
    pub jvm_name: &'static str,
    pub jvm_vendor: &'static str,
    pub jvm_version: &'static str,
    pub os_name: &'static str,
    pub os_arch: &'static str,
    pub available_processors: u32,
}

pub const AGENT: AgentDescriptor = AgentDescriptor {
    agent_version: "7.2.1",
    host: "drip-fleet",
    jvm_name: "OpenJDK 64-Bit Server VM",
    jvm_vendor: "Oracle Corporation",
    jvm_version: "1.8.0_121",
    os_name: "Linux",
    os_arch: "amd64",
    available_processors: 8,
};

/// Body of `POST /init`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    pub pid: u64,
    pub heap_initial_bytes: u64,
    pub heap_max_bytes: u64,
    #[serde(flatten)]
    pub agent: AgentDescriptor,
}

/// Response of `POST /init`
#[derive(Debug, Clone, Deserialize)]
pub struct InitResponse {
    #[serde(default)]
    pub authtoken: Option<String>,
}

/// One library the simulated application claims to load
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Module {
    pub name: &'static str,
    pub version: &'static str,
}

/// Body of `POST /moduleUpdate`
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModuleUpdate {
    pub modules: &'static [Module],
}

pub const MODULES: ModuleUpdate = ModuleUpdate {
    modules: &[
        Module { name: "spring-core", version: "4.3.7.RELEASE" },
        Module { name: "spring-webmvc", version: "4.3.7.RELEASE" },
        Module { name: "hibernate-core", version: "5.2.9.Final" },
        Module { name: "jackson-databind", version: "2.8.7" },
        Module { name: "tomcat-embed-core", version: "8.5.11" },
        Module { name: "postgresql", version: "42.0.0" },
        Module { name: "slf4j-api", version: "1.7.24" },
        Module { name: "guava", version: "21.0" },
    ],
};

/// Backend-assigned identifier for a metric name
#[derive(Debug, Clone, Deserialize)]
pub struct MetricDescriptor {
    pub name: String,
    pub id: serde_json::Number,
}

impl MetricDescriptor {
    /// Decimal form of the id; fractional ids are truncated
    pub fn id_string(&self) -> Option<String> {
        if let Some(id) = self.id.as_u64() {
            return Some(id.to_string());
        }
        match self.id.as_f64() {
            Some(id) if id.is_finite() && id >= 0.0 => Some((id as u64).to_string()),
            _ => None,
        }
    }
}

/// Response of a successful report
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportResponse {
    #[serde(default)]
    pub metrics: Option<Vec<MetricDescriptor>>,
}

impl ReportResponse {
    /// Parse a report body; an empty body means no descriptors
    pub fn from_body(body: &[u8]) -> serde_json::Result<Self> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
    }

    pub fn descriptors(&self) -> &[MetricDescriptor] {
        self.metrics.as_deref().unwrap_or(&[])
    }
}
