//! One simulated monitoring agent
//!
//! A session registers once, announces its modules once, then reports
//! metrics on a fixed period until cancelled. Registration and announcement
//! failures end the session; report failures only skip that round.

use std::sync::Arc;
use std::time::Instant;

use reqwest::StatusCode;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{FleetConfig, HeapSize};
use crate::error::{FleetError, Result};
use crate::metric_ids::MetricIdCache;
use crate::metrics::FleetMetrics;
use crate::protocol::{
    InitRequest, InitResponse, ReportResponse, AGENT, INIT_PATH, MODULES, MODULE_UPDATE_PATH,
    REPORT_PATH,
};
use crate::submission::Submission;
use crate::templates::Templates;
use crate::transport::{Credentials, RawResponse, Transport};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No auth token yet
    Unregistered,
    /// Holds an auth token
    Registered,
    /// Module list accepted
    Announced,
    /// Periodic reporting loop is running
    Reporting,
    /// Loop ended by cancellation or a terminal failure
    Stopped,
}

/// How a session's run ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// Cancellation token fired
    Cancelled,
    /// Registration or announcement failed
    Failed(FleetError),
}

impl SessionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SessionOutcome::Failed(_))
    }
}

pub struct Session {
    index: u64,
    app_name: String,
    heap: HeapSize,
    auth_token: Option<String>,
    metric_ids: MetricIdCache,
    state: SessionState,
    rounds: u64,
    transport: Transport,
    config: Arc<FleetConfig>,
    templates: Arc<Templates>,
    metrics: Arc<FleetMetrics>,
}

impl Session {
    pub fn new(
        index: u64,
        config: Arc<FleetConfig>,
        templates: Arc<Templates>,
        metrics: Arc<FleetMetrics>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            index,
            app_name: config.app_name(index),
            heap: config.heap,
            auth_token: None,
            metric_ids: MetricIdCache::new(),
            state: SessionState::Unregistered,
            rounds: 0,
            transport: Transport::new(config.clone())?,
            config,
            templates,
            metrics,
        })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn metric_ids(&self) -> &MetricIdCache {
        &self.metric_ids
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Report rounds attempted so far
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    fn credentials(&self) -> Credentials<'_> {
        Credentials {
            app_name: &self.app_name,
            auth_token: self.auth_token.as_deref(),
        }
    }

    async fn send(&self, path: &str, body: Vec<u8>) -> Result<RawResponse> {
        let sent = body.len() as u64;
        let request = self.transport.build_post(path, body, self.credentials())?;
        let response = self.transport.execute(request).await?;
        self.metrics
            .record_traffic(sent, response.body.len() as u64);
        Ok(response)
    }

    /// Obtain an auth token from the backend
    pub async fn register(&mut self) -> Result<()> {
        let request = InitRequest {
            pid: FleetConfig::pid(self.index),
            heap_initial_bytes: self.heap.initial(),
            heap_max_bytes: self.heap.bytes(),
            agent: AGENT,
        };
        let response = self.send(INIT_PATH, serde_json::to_vec(&request)?).await?;

        let parsed: InitResponse = serde_json::from_slice(&response.body)?;
        let token = parsed
            .authtoken
            .filter(|token| !token.is_empty())
            .ok_or(FleetError::MissingAuthToken)?;

        debug!("AuthToken: {}", token);
        info!("Registered");
        self.auth_token = Some(token);
        self.state = SessionState::Registered;
        self.metrics.record_registered();
        Ok(())
    }

    /// Send the static module list; the response is read and dropped
    pub async fn announce(&mut self) -> Result<()> {
        let response = self
            .send(MODULE_UPDATE_PATH, serde_json::to_vec(&MODULES)?)
            .await?;
        debug!("Module update answered {}", response.status);
        self.state = SessionState::Announced;
        Ok(())
    }

    /// Payload for the next report round
    pub fn next_submission(&self) -> Submission {
        Submission::build(&self.templates, &self.metric_ids, &self.app_name, self.heap)
    }

    /// Submit one round of metrics, returning how many metric ids were learned
    pub async fn report(&mut self) -> Result<usize> {
        self.rounds += 1;
        let body = serde_json::to_vec(&self.next_submission())?;

        let started = Instant::now();
        let result = match self.send(REPORT_PATH, body).await {
            Ok(response) if response.status != StatusCode::OK => Err(FleetError::UnexpectedStatus {
                status: response.status.as_u16(),
            }),
            Ok(response) => ReportResponse::from_body(&response.body).map_err(FleetError::from),
            Err(e) => Err(e),
        };
        let latency_us = started.elapsed().as_micros() as u64;

        match result {
            Ok(parsed) => {
                let learned = self.metric_ids.merge(parsed.descriptors());
                self.metrics
                    .record_report_success(latency_us, learned as u64);
                Ok(learned)
            }
            Err(e) => {
                self.metrics.record_report_failure(e.kind(), latency_us);
                Err(e)
            }
        }
    }

    /// Drive the full lifecycle until `cancel` fires or a setup step fails
    pub async fn run(&mut self, cancel: CancellationToken) -> SessionOutcome {
        let span = info_span!("session", app = %self.app_name);
        self.run_inner(cancel).instrument(span).await
    }

    async fn run_inner(&mut self, cancel: CancellationToken) -> SessionOutcome {
        let registered = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.register() => Some(result),
        };
        match registered {
            None => return self.stop(SessionOutcome::Cancelled),
            Some(Err(e)) => {
                error!("Registration failed: {}", e);
                return self.fail(e);
            }
            Some(Ok(())) => {}
        }

        let announced = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.announce() => Some(result),
        };
        match announced {
            None => return self.stop(SessionOutcome::Cancelled),
            Some(Err(e)) => {
                error!("Module announcement failed: {}", e);
                return self.fail(e);
            }
            Some(Ok(())) => {}
        }

        self.state = SessionState::Reporting;
        let mut ticker = tokio::time::interval(self.config.report_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let round = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.report() => Some(result),
            };
            match round {
                None => break,
                Some(Ok(0)) => debug!("Round {} reported", self.rounds),
                Some(Ok(learned)) => {
                    debug!("Round {} reported, learned {} metric ids", self.rounds, learned)
                }
                Some(Err(e)) => warn!("Report failed: {}", e),
            }
        }

        info!("Stopping after {} rounds", self.rounds);
        self.stop(SessionOutcome::Cancelled)
    }

    fn fail(&mut self, e: FleetError) -> SessionOutcome {
        self.metrics.record_session_failure(e.kind());
        self.stop(SessionOutcome::Failed(e))
    }

    fn stop(&mut self, outcome: SessionOutcome) -> SessionOutcome {
        self.state = SessionState::Stopped;
        outcome
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session[{}]", self.app_name)
    }
}
