//! # Drip Fleet
//!
//! Synthetic load for an APM ingestion backend: a fleet of simulated JVM
//! monitoring agents, each running the agent onboarding protocol and then
//! reporting metrics once a minute.
//!
//! ## Session lifecycle
//!
//! 1. `POST /init` with license key and app name headers; the response
//!    carries the session's auth token.
//! 2. `POST /moduleUpdate` with the static module list.
//! 3. `POST /v7/data` every reporting interval. The backend may answer with
//!    ids for metric names; later rounds send the id instead of the name.
//!
//! ## Usage
//!
//! ```bash
//! # One agent with a 512 GB heap
//! drip-fleet --key $LICENSE_KEY
//!
//! # 200 agents starting at guava1000, dumping all HTTP traffic
//! drip-fleet --key $LICENSE_KEY --count 200 --start 1000 --heap "4 GB" --debug
//! ```

pub mod config;
pub mod error;
pub mod fleet;
pub mod metric_ids;
pub mod metrics;
pub mod protocol;
pub mod session;
pub mod submission;
pub mod templates;
pub mod transport;

pub use config::{FleetConfig, HeapSize};
pub use error::{FleetError, Result};
pub use fleet::{FleetReport, FleetRunner, SessionReport};
pub use metric_ids::MetricIdCache;
pub use metrics::{FleetMetrics, FleetSummary};
pub use session::{Session, SessionOutcome, SessionState};
pub use submission::Submission;
pub use templates::Templates;
