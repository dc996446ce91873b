//! Default payloads for a simulated JVM application

use serde_json::{json, Value};

pub const HEAP_COMMITTED: &str = "JVM/Memory/HeapCommitted";
pub const HEAP_MAX: &str = "JVM/Memory/HeapMax";
pub const HARDWARE_RAM: &str = "JVM/Hardware/RAM";

/// Immutable starting point for every report
///
/// Built once per fleet and cloned into each round's submission.
#[derive(Debug, Clone)]
pub struct Templates {
    /// Per-metric defaults in submission order
    pub metrics: Vec<(String, Value)>,

    /// Application-level metric data attached to every report
    pub metric_data: Value,
}

impl Templates {
    pub fn new(metrics: Vec<(String, Value)>, metric_data: Value) -> Self {
        Self {
            metrics,
            metric_data,
        }
    }

    /// Metrics a JVM agent reports once a minute
    pub fn jvm() -> Self {
        let metrics = [
            (HEAP_COMMITTED, json!(0)),
            (HEAP_MAX, json!(0)),
            ("JVM/Memory/HeapUsed", json!(268_435_456u64)),
            ("JVM/Memory/NonHeapUsed", json!(83_886_080u64)),
            ("JVM/Memory/NonHeapCommitted", json!(100_663_296u64)),
            (HARDWARE_RAM, json!(0)),
            ("JVM/Hardware/CPU/Cores", json!(8)),
            ("JVM/CPU/ProcessLoad", json!(0.12)),
            ("JVM/CPU/SystemLoad", json!(0.31)),
            ("JVM/Threads/Live", json!(64)),
            ("JVM/Threads/Daemon", json!(48)),
            ("JVM/Classes/Loaded", json!(11_204)),
            ("JVM/GC/Young/Count", json!(3)),
            ("JVM/GC/Young/Time", json!(21)),
            ("JVM/GC/Old/Count", json!(0)),
            ("JVM/GC/Old/Time", json!(0)),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

        let metric_data = json!({
            "transactions": [
                {
                    "name": "WebTransaction/Servlet/index",
                    "count": 120,
                    "totalTimeMs": 3_480,
                    "minTimeMs": 4,
                    "maxTimeMs": 310,
                    "errors": 0
                },
                {
                    "name": "WebTransaction/Servlet/checkout",
                    "count": 18,
                    "totalTimeMs": 2_160,
                    "minTimeMs": 42,
                    "maxTimeMs": 480,
                    "errors": 1
                }
            ],
            "externalCalls": [
                {"host": "db.internal", "count": 240, "totalTimeMs": 1_920}
            ],
            "apdex": {"satisfied": 130, "tolerating": 7, "frustrated": 1}
        });

        Self::new(metrics, metric_data)
    }
}
