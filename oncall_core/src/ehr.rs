//! Electronic health record and progressive revelation.
//!
//! Every note and result carries a [`VisibilityRule`]. Visibility is never
//! stored: it is recomputed from the current simulated time and the patient's
//! action log whenever a view is built. Time only moves forward and the action
//! log is append-only, so anything visible stays visible.

use crate::actions::ActionType;
use crate::patient::{Patient, PatientState};
use crate::scheduler::Payload;
use crate::vitals::VitalsReading;
use chrono::NaiveDateTime;
use oncall_env::PatientId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// When a record item becomes visible to the trainee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum VisibilityRule {
    #[default]
    Always,
    TimeElapsed { visible_after_time: NaiveDateTime },
    ActionTaken { required_action: ActionType },
}

impl VisibilityRule {
    pub fn is_satisfied(&self, now: NaiveDateTime, actions_taken: &[ActionType]) -> bool {
        match self {
            VisibilityRule::Always => true,
            VisibilityRule::TimeElapsed { visible_after_time } => now >= *visible_after_time,
            VisibilityRule::ActionTaken { required_action } => actions_taken.contains(required_action),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    Admission,
    #[default]
    Progress,
    ConsultantReview,
    DischargeSummary,
    InvestigationResult,
    ProcedureNote,
    NursingNote,
}

impl NoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Admission => "admission",
            NoteType::Progress => "progress",
            NoteType::ConsultantReview => "consultant_review",
            NoteType::DischargeSummary => "discharge_summary",
            NoteType::InvestigationResult => "investigation_result",
            NoteType::ProcedureNote => "procedure_note",
            NoteType::NursingNote => "nursing_note",
        }
    }

    /// Human title used when a note is synthesized without one.
    pub fn default_title(&self) -> &'static str {
        match self {
            NoteType::Admission => "Admission Clerking",
            NoteType::Progress => "Progress Note",
            NoteType::ConsultantReview => "Consultant Review",
            NoteType::DischargeSummary => "Discharge Summary",
            NoteType::InvestigationResult => "Investigation Result",
            NoteType::ProcedureNote => "Procedure Note",
            NoteType::NursingNote => "Nursing Note",
        }
    }
}

impl std::fmt::Display for NoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admission" => Ok(NoteType::Admission),
            "progress" => Ok(NoteType::Progress),
            "consultant_review" => Ok(NoteType::ConsultantReview),
            "discharge_summary" => Ok(NoteType::DischargeSummary),
            "investigation_result" => Ok(NoteType::InvestigationResult),
            "procedure_note" => Ok(NoteType::ProcedureNote),
            "nursing_note" => Ok(NoteType::NursingNote),
            _ => Err(format!("Unknown note type: {}", s)),
        }
    }
}

/// A clinical note. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub note_id: String,
    pub note_type: NoteType,
    pub timestamp: NaiveDateTime,
    pub author: String,
    /// FY1, Registrar, Consultant, ...
    pub author_role: String,
    pub title: String,
    /// Free text or structured clerking
    pub content: Value,
    #[serde(default)]
    pub visibility_rule: VisibilityRule,
}

/// An investigation result. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationResult {
    pub result_id: String,
    /// ABG, FBC, CXR, ...
    pub investigation_type: String,
    pub requested_time: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulted_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub result_data: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
    #[serde(default)]
    pub abnormal_flags: Vec<String>,
    #[serde(default)]
    pub visibility_rule: VisibilityRule,
}

/// What an investigation returns, authored per patient state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestigationTemplate {
    #[serde(default)]
    pub result_data: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
    #[serde(default)]
    pub abnormal_flags: Vec<String>,
}

fn object(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

impl InvestigationTemplate {
    /// Unremarkable result for investigations the scenario did not script.
    pub fn normal(investigation: &str) -> Self {
        let (data, interpretation) = match investigation {
            "ABG" => (
                json!({"pH": 7.40, "pCO2": 5.0, "pO2": 12.0, "HCO3": 24, "BE": 0}),
                "Normal arterial blood gas".to_string(),
            ),
            "FBC" => (
                json!({"Hb": 135, "WCC": 7.5, "Platelets": 250}),
                "Normal full blood count".to_string(),
            ),
            "U&E" => (
                json!({"Na": 140, "K": 4.0, "Urea": 5.0, "Creatinine": 80}),
                "Normal renal function".to_string(),
            ),
            "CXR" => (
                json!({"findings": "No acute cardiopulmonary pathology"}),
                "Normal chest X-ray".to_string(),
            ),
            other => (json!({"status": "Normal"}), format!("Normal {}", other)),
        };

        Self {
            result_data: object(data),
            interpretation: Some(interpretation),
            abnormal_flags: Vec::new(),
        }
    }
}

/// Free-form medication entry (`name`, `dose`, `frequency`, ...).
pub type Medication = BTreeMap<String, String>;

/// A patient's notes, results and always-visible background.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub active_diagnoses: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<Medication>,
    #[serde(default)]
    pub clinical_notes: Vec<ClinicalNote>,
    #[serde(default)]
    pub investigation_results: Vec<InvestigationResult>,
}

impl PatientRecord {
    pub fn add_note(&mut self, note: ClinicalNote) {
        self.clinical_notes.push(note);
    }

    pub fn add_result(&mut self, result: InvestigationResult) {
        self.investigation_results.push(result);
    }

    pub fn has_result(&self, result_id: &str) -> bool {
        self.investigation_results
            .iter()
            .any(|r| r.result_id == result_id)
    }

    pub fn visible(&self, now: NaiveDateTime, actions_taken: &[ActionType]) -> VisibleSubset<'_> {
        visible_subset(&self.clinical_notes, &self.investigation_results, now, actions_taken)
    }
}

/// Borrowed view of what is currently revealed.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleSubset<'a> {
    pub notes: Vec<&'a ClinicalNote>,
    pub results: Vec<&'a InvestigationResult>,
}

/// Filters notes and results down to those whose rules are satisfied.
///
/// Pure; insertion order is preserved.
pub fn visible_subset<'a>(
    notes: &'a [ClinicalNote],
    results: &'a [InvestigationResult],
    now: NaiveDateTime,
    actions_taken: &[ActionType],
) -> VisibleSubset<'a> {
    VisibleSubset {
        notes: notes
            .iter()
            .filter(|n| n.visibility_rule.is_satisfied(now, actions_taken))
            .collect(),
        results: results
            .iter()
            .filter(|r| r.visibility_rule.is_satisfied(now, actions_taken))
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityCount {
    pub visible: usize,
    pub hidden: usize,
    pub total: usize,
}

impl VisibilityCount {
    fn new(visible: usize, total: usize) -> Self {
        Self {
            visible,
            hidden: total.saturating_sub(visible),
            total,
        }
    }
}

/// "N of M visible" for one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilitySummary {
    pub patient_id: PatientId,
    pub notes: VisibilityCount,
    pub results: VisibilityCount,
}

impl VisibilitySummary {
    pub fn compute(patient: &Patient, now: NaiveDateTime) -> Self {
        let record = patient.record();
        let visible = record.visible(now, &patient.action_types());
        Self {
            patient_id: patient.id.clone(),
            notes: VisibilityCount::new(visible.notes.len(), record.clinical_notes.len()),
            results: VisibilityCount::new(visible.results.len(), record.investigation_results.len()),
        }
    }
}

/// What the trainee sees when opening a patient's chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecordView {
    pub patient_id: PatientId,
    pub mrn: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub ward: String,
    pub bed: String,
    pub current_state: PatientState,
    pub allergies: Vec<String>,
    pub active_diagnoses: Vec<String>,
    pub current_medications: Vec<Medication>,
    pub visible_notes: Vec<ClinicalNote>,
    pub visible_results: Vec<InvestigationResult>,
    pub total_notes: usize,
    pub total_results: usize,
    /// Scored from the current state's bedside observations, if scripted
    pub latest_vitals: Option<VitalsReading>,
    pub as_of: NaiveDateTime,
}

impl PatientRecordView {
    pub fn build(patient: &Patient, now: NaiveDateTime) -> Self {
        let record = patient.record();
        let visible = record.visible(now, &patient.action_types());
        let demographics = &patient.demographics;

        let latest_vitals = patient
            .trajectory()
            .examination_findings(patient.current_state())
            .and_then(|findings| findings.get("observations"))
            .and_then(|obs| obs.as_str())
            .map(|obs| VitalsReading::from_observations(obs, now));

        Self {
            patient_id: patient.id.clone(),
            mrn: demographics.mrn.clone(),
            name: demographics.name.clone(),
            age: demographics.age,
            gender: demographics.gender.clone(),
            ward: demographics.ward.clone(),
            bed: demographics.bed.clone(),
            current_state: patient.current_state(),
            allergies: record.allergies.clone(),
            active_diagnoses: record.active_diagnoses.clone(),
            current_medications: record.current_medications.clone(),
            visible_notes: visible.notes.into_iter().cloned().collect(),
            visible_results: visible.results.into_iter().cloned().collect(),
            total_notes: record.clinical_notes.len(),
            total_results: record.investigation_results.len(),
            latest_vitals,
            as_of: now,
        }
    }
}
