//! On-Call Deterministic Simulation Harness
//!
//! This crate replays night shifts against the kernel with every source of
//! non-determinism pinned:
//! - **Time**: a virtual wall clock that only moves when a script waits
//! - **Entropy**: note, result, event and session ids drawn from one seed
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    ScenarioRunner                      │
//! │  ┌───────────────┐  script   ┌──────────────────────┐  │
//! │  │  ScenarioId   │──────────►│    SessionStore      │  │
//! │  │  definition   │           │  ┌────────────────┐  │  │
//! │  │  script       │           │  │    Session     │  │  │
//! │  │  expectations │           │  └───────▲────────┘  │  │
//! │  └───────────────┘           └──────────┼───────────┘  │
//! │  ┌───────────────┐  wall_time/derive_id │              │
//! │  │  SimContext   │──────────────────────┘              │
//! │  └───────────────┘                                     │
//! │        frames ──► SessionExport (JSON)                 │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use oncall_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::CopdDeterioration);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod runner;
pub mod scenarios;
mod store;

pub use context::SimContext;
pub use error::HarnessError;
pub use exporter::{PatientFrame, SessionExport, SessionFrame};
pub use runner::{ward_round, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::{Expectation, ScenarioId, ScriptStep};
pub use store::{SessionListing, SessionStore, StoreConfig};
