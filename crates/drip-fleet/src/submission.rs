//! Per-round report payload

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::HeapSize;
use crate::metric_ids::MetricIdCache;
use crate::templates::{Templates, HARDWARE_RAM, HEAP_COMMITTED, HEAP_MAX};

/// Value emitted for a metric given the configured heap capacity
pub fn synthesize_value(name: &str, default: &Value, heap: HeapSize) -> Value {
    match name {
        HEAP_COMMITTED | HEAP_MAX => Value::from(heap.bytes()),
        HARDWARE_RAM => Value::from(heap.bytes().saturating_mul(10)),
        _ => default.clone(),
    }
}

/// Application metrics tagged with the reporting session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetrics {
    pub app_name: String,
    pub metric_data: Value,
}

/// Body of one report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Single-entry objects keyed by metric id or name
    pub metrics: Vec<Map<String, Value>>,
    pub app_metrics: Vec<AppMetrics>,
}

impl Submission {
    pub fn build(templates: &Templates, ids: &MetricIdCache, app_name: &str, heap: HeapSize) -> Self {
        let metrics = templates
            .metrics
            .iter()
            .map(|(name, default)| {
                let mut entry = Map::with_capacity(1);
                entry.insert(
                    ids.key_for(name).to_string(),
                    synthesize_value(name, default, heap),
                );
                entry
            })
            .collect();

        Self {
            metrics,
            app_metrics: vec![AppMetrics {
                app_name: app_name.to_string(),
                metric_data: templates.metric_data.clone(),
            }],
        }
    }

    /// Value submitted under `key`, if any entry uses it
    pub fn value_of(&self, key: &str) -> Option<&Value> {
        self.metrics.iter().find_map(|entry| entry.get(key))
    }
}
