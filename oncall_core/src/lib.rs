//! On-Call Core - Simulation Kernel for Night-Shift Triage Training
//!
//! This library models what happens to a ward of patients while a junior
//! doctor decides who to see first:
//! 1. **Time**: a hybrid clock where real time passes and bedside reviews cost extra
//! 2. **Consequences**: rule-driven patient state machines and a future-event queue
//! 3. **Information**: an EHR that only reveals results once they would exist

pub mod actions;
pub mod clock;
pub mod config;
pub mod ehr;
pub mod error;
pub mod patient;
pub mod scenario;
pub mod scheduler;
pub mod session;
pub mod vitals;

#[cfg(test)]
mod test_support;

// Re-export key types for convenience
pub use actions::{ActionResult, ActionType, UserAction};
pub use clock::{ClockSnapshot, SimulationClock};
pub use config::SessionConfig;
pub use ehr::{PatientRecordView, VisibilityRule, VisibilitySummary};
pub use error::SimError;
pub use patient::{Patient, PatientState, StateChangeRule, Urgency};
pub use scenario::ScenarioDefinition;
pub use scheduler::{EventKind, EventScheduler, Payload, ScheduledEvent};
pub use session::{Session, SessionSnapshot, SessionStatus, SessionSummary};
pub use vitals::{NewsRisk, VitalSigns};
