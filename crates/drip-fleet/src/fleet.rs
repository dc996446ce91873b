//! Fleet orchestration
//!
//! Launches one task per session with a small random delay between launches
//! so the backend does not see every registration at once, then waits for
//! all of them. Sessions only end on a setup failure or on cancellation.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::FleetConfig;
use crate::error::Result;
use crate::metrics::{FleetMetrics, FleetSummary};
use crate::session::{Session, SessionOutcome};
use crate::templates::Templates;

/// How one session ended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub index: u64,
    pub app_name: String,
    pub rounds: u64,
    pub error: Option<String>,
}

impl SessionReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of a whole fleet run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetReport {
    pub sessions: Vec<SessionReport>,
    pub summary: FleetSummary,
}

/// Uniform delay in `[0, max)`
pub fn jitter_delay(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    rand::thread_rng().gen_range(Duration::ZERO..max)
}

pub struct FleetRunner {
    config: Arc<FleetConfig>,
    templates: Arc<Templates>,
    metrics: Arc<FleetMetrics>,
    cancel: CancellationToken,
}

impl FleetRunner {
    pub fn new(config: FleetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            templates: Arc::new(Templates::jvm()),
            metrics: Arc::new(FleetMetrics::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the default JVM payload templates
    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    /// Token that stops every session when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Launch the fleet and wait for every session to end
    pub async fn run(&self) -> FleetReport {
        let first = self.config.start_index;
        let count = self.config.fleet_size as u64;
        info!(
            "Launching {} sessions ({}{}..{}{}) against {} with {} heap",
            count,
            self.config.app_prefix,
            first,
            self.config.app_prefix,
            first + count.saturating_sub(1),
            self.config.api_root,
            self.config.heap
        );

        let mut tasks = FuturesUnordered::new();
        let mut sessions = Vec::with_capacity(self.config.fleet_size);

        for index in first..first + count {
            let jitter = jitter_delay(self.config.max_jitter());
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = sleep(jitter) => {}
            }

            let mut session = match Session::new(
                index,
                self.config.clone(),
                self.templates.clone(),
                self.metrics.clone(),
            ) {
                Ok(session) => session,
                Err(e) => {
                    error!("Could not create session {}: {}", index, e);
                    self.metrics.record_session_failure(e.kind());
                    sessions.push(SessionReport {
                        index,
                        app_name: self.config.app_name(index),
                        rounds: 0,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };

            self.metrics.record_launch();
            let token = self.cancel.child_token();
            tasks.push(tokio::spawn(async move {
                let outcome = session.run(token).await;
                SessionReport {
                    index: session.index(),
                    app_name: session.app_name().to_string(),
                    rounds: session.rounds(),
                    error: match outcome {
                        SessionOutcome::Failed(e) => Some(e.to_string()),
                        SessionOutcome::Cancelled => None,
                    },
                }
            }));
        }

        info!("{} sessions running", tasks.len());

        let mut status = tokio::time::interval(self.config.report_interval());
        status.set_missed_tick_behavior(MissedTickBehavior::Delay);
        status.tick().await;

        loop {
            tokio::select! {
                joined = tasks.next() => match joined {
                    Some(Ok(report)) => sessions.push(report),
                    Some(Err(e)) => error!("Session task ended abnormally: {}", e),
                    None => break,
                },
                _ = status.tick() => self.log_status(tasks.len()),
            }
        }

        sessions.sort_by_key(|report| report.index);
        info!("All sessions finished");

        FleetReport {
            sessions,
            summary: self.metrics.summary(),
        }
    }

    fn log_status(&self, running: usize) {
        let summary = self.metrics.summary();
        info!(
            "{} sessions running, {} failed; reports {}/{} ok, p99 {}µs",
            running,
            summary.sessions_failed,
            summary.reports_succeeded,
            summary.reports_sent,
            summary.latency_p99_us
        );
    }
}
