//! JSON exporter for session replays.
//!
//! Captures the ward after every action so a debrief tool can scrub through
//! the shift frame by frame.

use crate::error::HarnessError;
use chrono::NaiveDateTime;
use oncall_core::ehr::{VisibilityCount, VisibilitySummary};
use oncall_core::session::TimelineEntry;
use oncall_core::{ActionType, PatientState, Session, SessionSummary};
use oncall_env::PatientId;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// One patient as seen in a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientFrame {
    pub patient_id: PatientId,
    pub name: String,
    pub state: PatientState,
    pub notes: VisibilityCount,
    pub results: VisibilityCount,
}

/// The ward at one point of the shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFrame {
    /// Simulated time
    pub time: NaiveDateTime,

    pub elapsed_minutes: i64,

    /// Action that produced this frame; absent for the opening frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<PatientId>,

    pub patients: Vec<PatientFrame>,

    /// Bleeps raised by this step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
}

impl SessionFrame {
    /// Captures `session` as it stands, attributing it to `entry`.
    pub fn capture(session: &Session, entry: Option<&TimelineEntry>, events: Vec<String>) -> Self {
        let now = session.now();
        Self {
            time: now,
            elapsed_minutes: session.clock().elapsed_minutes(),
            action: entry.map(|e| e.action_type),
            patient_id: entry.map(|e| e.patient_id.clone()),
            patients: session
                .patients()
                .map(|p| {
                    let visibility = VisibilitySummary::compute(p, now);
                    PatientFrame {
                        patient_id: p.id.clone(),
                        name: p.demographics.name.clone(),
                        state: p.current_state(),
                        notes: visibility.notes,
                        results: visibility.results,
                    }
                })
                .collect(),
            events,
        }
    }
}

/// Complete replay export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Simulated minutes covered
    pub duration_minutes: i64,

    /// All frames
    pub frames: Vec<SessionFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
}

impl SessionExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_minutes: 0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
            summary: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SessionFrame) {
        self.duration_minutes = frame.elapsed_minutes;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>, summary: Option<SessionSummary>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
        self.summary = summary;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), HarnessError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use crate::scenarios::ScenarioId;
    use oncall_core::{SessionConfig, UserAction};

    #[test]
    fn test_capture_frames_and_serialize() {
        let ctx = SimContext::shared(3);
        let mut session = Session::from_scenario(
            &ScenarioId::CopdDeterioration.definition(),
            SessionConfig::default(),
            ctx,
            None,
        )
        .unwrap();

        let mut export = SessionExport::new("copd_deterioration", 3);
        export.add_frame(SessionFrame::capture(&session, None, Vec::new()));

        let result = session
            .execute_action(UserAction::new(ActionType::ReviewInPerson, "pt_001"))
            .unwrap();
        export.add_frame(SessionFrame::capture(
            &session,
            session.timeline().last(),
            result.new_notifications,
        ));

        assert_eq!(export.frames.len(), 2);
        assert_eq!(export.duration_minutes, 30);

        let opening = &export.frames[0];
        assert!(opening.action.is_none());
        // Seeded clerking note only
        assert_eq!(opening.patients[0].notes.total, 1);

        let reviewed = &export.frames[1];
        assert_eq!(reviewed.action, Some(ActionType::ReviewInPerson));
        assert_eq!(reviewed.patients[0].notes.visible, 2);

        export.finalize(true, None, Some(session.summary()));
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["scenario"], "copd_deterioration");
        assert_eq!(json["frames"][1]["action"], "review_in_person");
        assert!(json.get("failure_reason").is_none());

        let back: SessionExport = serde_json::from_value(json).unwrap();
        assert_eq!(back, export);
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let export = SessionExport::new("x", 1);
        let err = export
            .write_to_file("/nonexistent-dir/oncall/export.json")
            .unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
