//! User actions and the result payload returned for each one.

use crate::ehr::VisibilitySummary;
use crate::error::SimError;
use crate::patient::{PatientState, Urgency};
use crate::scheduler::{EventKind, Payload};
use chrono::NaiveDateTime;
use oncall_env::PatientId;
use serde::{Deserialize, Serialize};

/// The closed set of things a trainee can do to a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Walk to the ward and examine the patient. The only action that costs
    /// artificial time.
    ReviewInPerson,
    /// Order a blood test, gas or imaging
    RequestInvestigation,
    /// Call a senior
    Escalate,
    /// Write in the notes
    DocumentNote,
    /// Ask the ward nurse something over the phone
    AskNurseQuestion,
}

impl ActionType {
    pub fn all() -> [ActionType; 5] {
        [
            ActionType::ReviewInPerson,
            ActionType::RequestInvestigation,
            ActionType::Escalate,
            ActionType::DocumentNote,
            ActionType::AskNurseQuestion,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ReviewInPerson => "review_in_person",
            ActionType::RequestInvestigation => "request_investigation",
            ActionType::Escalate => "escalate",
            ActionType::DocumentNote => "document_note",
            ActionType::AskNurseQuestion => "ask_nurse_question",
        }
    }

    /// Nominal minutes the action takes, recorded on the timeline.
    ///
    /// Only [`ActionType::ReviewInPerson`] turns this into artificial clock time.
    pub fn default_time_cost(&self) -> u32 {
        match self {
            ActionType::ReviewInPerson => 30,
            ActionType::RequestInvestigation => 2,
            ActionType::Escalate => 5,
            ActionType::DocumentNote => 5,
            ActionType::AskNurseQuestion => 2,
        }
    }

    /// Whether executing this action pushes the clock forward artificially.
    pub fn advances_clock(&self) -> bool {
        matches!(self, ActionType::ReviewInPerson)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::all()
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| SimError::validation(format!("Unsupported action type: {}", s)))
    }
}

/// Pre-computed reply from the external nurse responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NurseResponse {
    pub response_text: String,
    pub time_cost_minutes: u32,
}

/// A single action requested by the trainee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAction {
    pub action_type: ActionType,
    pub patient_id: PatientId,

    /// Action-specific fields (`investigation_type`, `note_content`, ...)
    #[serde(default)]
    pub details: Payload,

    /// Overrides the default cost of an in-person review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_cost_minutes: Option<u32>,

    /// Required for `ask_nurse_question`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nurse_response: Option<NurseResponse>,
}

impl UserAction {
    pub fn new(action_type: ActionType, patient_id: impl Into<PatientId>) -> Self {
        Self {
            action_type,
            patient_id: patient_id.into(),
            details: Payload::new(),
            time_cost_minutes: None,
            nurse_response: None,
        }
    }

    /// Adds one detail field.
    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn with_time_cost(mut self, minutes: u32) -> Self {
        self.time_cost_minutes = Some(minutes);
        self
    }

    pub fn with_nurse_response(mut self, response_text: impl Into<String>, minutes: u32) -> Self {
        self.nurse_response = Some(NurseResponse {
            response_text: response_text.into(),
            time_cost_minutes: minutes,
        });
        self
    }

    /// Minutes this action costs: the explicit override, the nurse
    /// responder's estimate, or the action type's default.
    pub fn time_cost(&self) -> u32 {
        if let Some(minutes) = self.time_cost_minutes {
            return minutes;
        }
        if let Some(response) = &self.nurse_response {
            return response.time_cost_minutes;
        }
        self.action_type.default_time_cost()
    }

    /// Reads a string detail.
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(|v| v.as_str())
    }

    /// Checks the fields each action type requires.
    pub fn validate(&self) -> Result<(), SimError> {
        match self.action_type {
            ActionType::RequestInvestigation => {
                match self.detail_str("investigation_type") {
                    Some(kind) if !kind.trim().is_empty() => {}
                    _ => {
                        return Err(SimError::validation(
                            "request_investigation requires details.investigation_type",
                        ))
                    }
                }
                if let Some(value) = self.details.get("turnaround_minutes") {
                    match value.as_u64() {
                        Some(minutes) if minutes >= 1 => {}
                        _ => {
                            return Err(SimError::validation(
                                "details.turnaround_minutes must be a positive integer",
                            ))
                        }
                    }
                }
            }
            ActionType::DocumentNote => {
                if self.detail_str("note_content").is_none() {
                    return Err(SimError::validation(
                        "document_note requires details.note_content",
                    ));
                }
            }
            ActionType::AskNurseQuestion => {
                if self.nurse_response.is_none() {
                    return Err(SimError::validation(
                        "ask_nurse_question requires a nurse_response",
                    ));
                }
            }
            ActionType::ReviewInPerson | ActionType::Escalate => {}
        }
        Ok(())
    }
}

/// Entry in a patient's append-only action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_type: ActionType,
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub details: Payload,
}

/// Summary of one event delivered while executing an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredEvent {
    pub event_id: String,
    pub kind: EventKind,
    pub patient_id: PatientId,
    pub due_time: NaiveDateTime,
    pub notifications: Vec<String>,
}

/// Summary of one patient state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeSummary {
    pub patient_id: PatientId,
    pub patient_name: String,
    pub old_state: PatientState,
    pub new_state: PatientState,
    pub reason: String,
    pub message: String,
    pub urgency: Urgency,
    pub time: NaiveDateTime,
}

/// Outcome of executing an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub action: UserAction,
    pub time_advanced_minutes: i64,
    pub new_simulation_time: NaiveDateTime,
    pub message: String,
    pub triggered_events: Vec<TriggeredEvent>,
    pub new_notifications: Vec<String>,
    pub patient_state_changes: Vec<StateChangeSummary>,
    /// Visibility counts for every patient this action touched
    pub visibility: Vec<VisibilitySummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_types() {
        assert_eq!("escalate".parse::<ActionType>(), Ok(ActionType::Escalate));
        assert_eq!(
            "review_in_person".parse::<ActionType>(),
            Ok(ActionType::ReviewInPerson)
        );

        let err = "prescribe_magic".parse::<ActionType>().unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_only_review_advances_clock() {
        let advancing: Vec<ActionType> = ActionType::all()
            .into_iter()
            .filter(|a| a.advances_clock())
            .collect();
        assert_eq!(advancing, vec![ActionType::ReviewInPerson]);
    }

    #[test]
    fn test_time_cost_precedence() {
        let action = UserAction::new(ActionType::ReviewInPerson, "pt_001");
        assert_eq!(action.time_cost(), 30);
        assert_eq!(action.with_time_cost(45).time_cost(), 45);

        let chat = UserAction::new(ActionType::AskNurseQuestion, "pt_001")
            .with_nurse_response("Sats are 89% on 2L", 4);
        assert_eq!(chat.time_cost(), 4);
    }

    #[test]
    fn test_validate_required_fields() {
        let missing = UserAction::new(ActionType::RequestInvestigation, "pt_001");
        assert!(matches!(missing.validate(), Err(SimError::Validation(_))));

        let ok = missing.with_detail("investigation_type", "ABG");
        assert!(ok.validate().is_ok());

        let zero = ok.clone().with_detail("turnaround_minutes", 0);
        assert!(matches!(zero.validate(), Err(SimError::Validation(_))));

        let note = UserAction::new(ActionType::DocumentNote, "pt_001");
        assert!(note.validate().is_err());
        assert!(note.with_detail("note_content", "Reviewed.").validate().is_ok());

        let chat = UserAction::new(ActionType::AskNurseQuestion, "pt_001");
        assert!(chat.validate().is_err());
    }

    #[test]
    fn test_action_deserializes_from_api_shape() {
        let action: UserAction = serde_json::from_str(
            r#"{
                "action_type": "request_investigation",
                "patient_id": "pt_001",
                "details": { "investigation_type": "ABG" }
            }"#,
        )
        .unwrap();

        assert_eq!(action.action_type, ActionType::RequestInvestigation);
        assert_eq!(action.detail_str("investigation_type"), Some("ABG"));
        assert!(action.time_cost_minutes.is_none());
    }
}
