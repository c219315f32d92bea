//! Scenario definitions: the data a session is built from.
//!
//! Scenarios are authored as JSON (or assembled in code with the builder
//! methods below) and consumed once, at session creation.

use crate::ehr::{ClinicalNote, InvestigationResult, InvestigationTemplate, Medication, PatientRecord};
use crate::error::SimError;
use crate::patient::{Demographics, PatientState, StateChangeRule, Trajectory};
use crate::scheduler::{EventKind, Payload};
use chrono::{NaiveDate, NaiveDateTime};
use oncall_env::PatientId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 20:00 on the canonical scenario date, the usual start of a night shift.
pub fn default_start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|d| d.and_hms_opt(20, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default = "default_duration")]
    pub estimated_duration_minutes: u32,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

fn default_duration() -> u32 {
    60
}

impl Default for ScenarioMetadata {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            description: String::new(),
            difficulty: default_difficulty(),
            estimated_duration_minutes: default_duration(),
        }
    }
}

/// One patient as authored in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientDefinition {
    pub patient_id: PatientId,

    #[serde(flatten)]
    pub demographics: Demographics,

    pub initial_state: PatientState,

    #[serde(default)]
    pub trajectory: Trajectory,

    /// Seeded chart: background, notes and results with visibility rules
    #[serde(flatten)]
    pub record: PatientRecord,
}

impl PatientDefinition {
    pub fn new(patient_id: &str, demographics: Demographics, initial_state: PatientState) -> Self {
        Self {
            patient_id: PatientId::from(patient_id),
            demographics,
            initial_state,
            trajectory: Trajectory::default(),
            record: PatientRecord::default(),
        }
    }

    pub fn with_rule(mut self, rule: StateChangeRule) -> Self {
        self.trajectory.rules.push(rule);
        self
    }

    /// Sets what an in-person review finds in `state`.
    pub fn with_findings(mut self, state: PatientState, findings: Payload) -> Self {
        self.trajectory.examination_findings.insert(state, findings);
        self
    }

    /// Scripts the result `investigation` returns while in `state`.
    pub fn with_investigation(
        mut self,
        state: PatientState,
        investigation: &str,
        template: InvestigationTemplate,
    ) -> Self {
        self.trajectory
            .investigation_templates
            .entry(state)
            .or_default()
            .insert(investigation.to_string(), template);
        self
    }

    pub fn with_background(
        mut self,
        allergies: &[&str],
        diagnoses: &[&str],
        medications: Vec<Medication>,
    ) -> Self {
        self.record.allergies = allergies.iter().map(|s| s.to_string()).collect();
        self.record.active_diagnoses = diagnoses.iter().map(|s| s.to_string()).collect();
        self.record.current_medications = medications;
        self
    }

    pub fn with_note(mut self, note: ClinicalNote) -> Self {
        self.record.add_note(note);
        self
    }

    pub fn with_result(mut self, result: InvestigationResult) -> Self {
        self.record.add_result(result);
        self
    }
}

/// A pre-scheduled occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    /// Generated at session creation if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub event_type: EventKind,
    pub scheduled_time: NaiveDateTime,
    pub patient_id: PatientId,
    #[serde(default)]
    pub data: Payload,
}

impl EventDefinition {
    pub fn new(event_type: EventKind, scheduled_time: NaiveDateTime, patient_id: &str) -> Self {
        Self {
            event_id: None,
            event_type,
            scheduled_time,
            patient_id: PatientId::from(patient_id),
            data: Payload::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// A complete scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub scenario_id: String,

    #[serde(default)]
    pub metadata: ScenarioMetadata,

    #[serde(default = "default_start_time")]
    pub start_time: NaiveDateTime,

    pub patients: Vec<PatientDefinition>,

    #[serde(default)]
    pub scheduled_events: Vec<EventDefinition>,
}

impl ScenarioDefinition {
    pub fn new(scenario_id: &str, title: &str, start_time: NaiveDateTime) -> Self {
        Self {
            scenario_id: scenario_id.to_string(),
            metadata: ScenarioMetadata {
                title: title.to_string(),
                ..Default::default()
            },
            start_time,
            patients: Vec::new(),
            scheduled_events: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.metadata.description = description.to_string();
        self
    }

    pub fn with_patient(mut self, patient: PatientDefinition) -> Self {
        self.patients.push(patient);
        self
    }

    pub fn with_event(mut self, event: EventDefinition) -> Self {
        self.scheduled_events.push(event);
        self
    }

    /// Parses and validates a JSON scenario.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let scenario: Self = serde_json::from_str(json)
            .map_err(|e| SimError::validation(format!("Invalid scenario JSON: {}", e)))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Checks structural consistency.
    ///
    /// At least one patient, unique patient ids, every event names a known
    /// patient.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.patients.is_empty() {
            return Err(SimError::validation(format!(
                "Scenario {} has no patients",
                self.scenario_id
            )));
        }

        let mut ids = BTreeSet::new();
        for patient in &self.patients {
            if !ids.insert(&patient.patient_id) {
                return Err(SimError::validation(format!(
                    "Duplicate patient id: {}",
                    patient.patient_id
                )));
            }
        }

        for event in &self.scheduled_events {
            if !ids.contains(&event.patient_id) {
                return Err(SimError::validation(format!(
                    "Event {} references unknown patient {}",
                    event.event_type, event.patient_id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionType;
    use crate::ehr::VisibilityRule;
    use crate::patient::RuleTrigger;
    use crate::test_support::at;

    const SCENARIO: &str = r#"{
        "scenario_id": "copd_night",
        "metadata": {"title": "COPD exacerbation", "difficulty": "easy"},
        "start_time": "2024-01-15T20:00:00",
        "patients": [{
            "patient_id": "pt_001",
            "name": "Margaret Thompson",
            "mrn": "MRN12345",
            "age": 72,
            "gender": "Female",
            "ward": "Ward 4A",
            "bed": "Bed 12",
            "initial_state": "stable_with_concerns",
            "allergies": ["Penicillin"],
            "active_diagnoses": ["COPD"],
            "current_medications": [{"name": "Salbutamol", "dose": "2.5mg nebs"}],
            "trajectory": {
                "state_change_rules": [{
                    "rule_id": "rule_001",
                    "trigger_type": "time_elapsed",
                    "trigger_time": "2024-01-15T21:30:00",
                    "current_state_requirement": "stable_with_concerns",
                    "new_state": "deteriorating",
                    "notification_message": "Nurse: Margaret looks more breathless",
                    "urgency": "high"
                }],
                "examination_findings": {
                    "deteriorating": {"observations": "RR 26, SpO2 88%"}
                }
            },
            "clinical_notes": [{
                "note_id": "note_seed",
                "note_type": "admission",
                "timestamp": "2024-01-15T14:30:00",
                "author": "Dr. James Wilson",
                "author_role": "FY1",
                "title": "Admission Clerking",
                "content": {"presenting_complaint": "Shortness of breath"},
                "visibility_rule": {"condition": "action_taken", "required_action": "review_in_person"}
            }]
        }],
        "scheduled_events": [{
            "event_type": "new_request",
            "scheduled_time": "2024-01-15T20:45:00",
            "patient_id": "pt_001",
            "data": {"notification_message": "Family asking for update"}
        }]
    }"#;

    #[test]
    fn test_parse_scenario_json() {
        let scenario = ScenarioDefinition::from_json(SCENARIO).unwrap();

        assert_eq!(scenario.scenario_id, "copd_night");
        assert_eq!(scenario.metadata.difficulty, "easy");
        assert_eq!(scenario.metadata.estimated_duration_minutes, 60);
        assert_eq!(scenario.start_time, at(20, 0));

        let patient = &scenario.patients[0];
        assert_eq!(patient.demographics.name, "Margaret Thompson");
        assert_eq!(patient.initial_state, PatientState::StableWithConcerns);
        assert_eq!(patient.record.allergies, vec!["Penicillin"]);
        assert_eq!(
            patient.record.current_medications[0].get("dose").map(String::as_str),
            Some("2.5mg nebs")
        );

        let rule = &patient.trajectory.rules[0];
        assert_eq!(rule.trigger, RuleTrigger::TimeElapsed { trigger_time: at(21, 30) });
        assert_eq!(rule.current_state_requirement, Some(PatientState::StableWithConcerns));
        assert!(patient
            .trajectory
            .examination_findings(PatientState::Deteriorating)
            .is_some());

        assert_eq!(
            patient.record.clinical_notes[0].visibility_rule,
            VisibilityRule::ActionTaken {
                required_action: ActionType::ReviewInPerson
            }
        );

        assert_eq!(scenario.scheduled_events[0].event_type, EventKind::NewRequest);
        assert!(scenario.scheduled_events[0].event_id.is_none());
    }

    #[test]
    fn test_start_time_defaults_to_night_shift() {
        let scenario: ScenarioDefinition = serde_json::from_str(
            r#"{"scenario_id": "x", "patients": []}"#,
        )
        .unwrap();
        assert_eq!(scenario.start_time, at(20, 0));
        assert_eq!(scenario.metadata.title, "Untitled");
    }

    #[test]
    fn test_validate_rejects_empty_scenario() {
        let scenario = ScenarioDefinition::new("empty", "Empty", at(20, 0));
        assert_eq!(scenario.validate().unwrap_err().kind(), "validation");
    }

    #[test]
    fn test_validate_rejects_duplicate_and_unknown_patients() {
        let demographics = Demographics {
            name: "A".to_string(),
            mrn: "1".to_string(),
            age: 50,
            gender: "Male".to_string(),
            ward: "W".to_string(),
            bed: "1".to_string(),
        };
        let p = PatientDefinition::new("pt_001", demographics, PatientState::Stable);

        let duplicated = ScenarioDefinition::new("dup", "Dup", at(20, 0))
            .with_patient(p.clone())
            .with_patient(p.clone());
        assert!(duplicated.validate().is_err());

        let orphan_event = ScenarioDefinition::new("orphan", "Orphan", at(20, 0))
            .with_patient(p)
            .with_event(EventDefinition::new(EventKind::NewRequest, at(20, 30), "pt_404"));
        let err = orphan_event.validate().unwrap_err();
        assert!(err.to_string().contains("pt_404"));
    }

    #[test]
    fn test_malformed_json_is_a_validation_error() {
        let err = ScenarioDefinition::from_json("{not json").unwrap_err();
        assert_eq!(err.kind(), "validation");
    }
}
