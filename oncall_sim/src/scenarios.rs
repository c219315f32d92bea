//! Built-in night-shift scenarios with scripted trainee behaviour.
//!
//! Each scenario pairs a `ScenarioDefinition` with a short script and the
//! patient states the script must leave behind. The runner replays the
//! script against a seeded `SimContext`.

use chrono::{Duration, NaiveDateTime};
use oncall_core::actions::{ActionType, UserAction};
use oncall_core::ehr::{ClinicalNote, InvestigationTemplate, NoteType, VisibilityRule};
use oncall_core::patient::{Demographics, PatientState, StateChangeRule, Urgency};
use oncall_core::scenario::{default_start_time, EventDefinition, PatientDefinition, ScenarioDefinition};
use oncall_core::scheduler::{EventKind, Payload};
use serde_json::{json, Value};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// COPD patient who deteriorates at 21:30 and settles once escalated
    CopdDeterioration,

    /// Septic patient who crashes if nobody escalates within the hour
    SepsisDeadline,

    /// Four patients, bleeps arriving while the trainee is at a bedside
    BusyNight,
}

/// One step of a scripted shift.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Real time passes before the next action
    Wait(i64),

    /// The trainee acts
    Act(UserAction),
}

/// State a patient must be in when the script ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub patient_id: &'static str,
    pub final_state: PatientState,
}

impl Expectation {
    fn new(patient_id: &'static str, final_state: PatientState) -> Self {
        Self {
            patient_id,
            final_state,
        }
    }
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::CopdDeterioration,
            ScenarioId::SepsisDeadline,
            ScenarioId::BusyNight,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::CopdDeterioration => "copd_deterioration",
            ScenarioId::SepsisDeadline => "sepsis_deadline",
            ScenarioId::BusyNight => "busy_night",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::CopdDeterioration => {
                "COPD exacerbation that tips into type 2 respiratory failure at 21:30"
            }
            ScenarioId::SepsisDeadline => "Febrile post-op patient, escalate within the hour or lose them",
            ScenarioId::BusyNight => "Four patients, overlapping bleeps and a scheduled deterioration",
        }
    }

    /// Builds the scenario data.
    pub fn definition(&self) -> ScenarioDefinition {
        match self {
            ScenarioId::CopdDeterioration => copd_deterioration(),
            ScenarioId::SepsisDeadline => sepsis_deadline(),
            ScenarioId::BusyNight => busy_night(),
        }
    }

    /// The scripted trainee for this scenario.
    pub fn script(&self) -> Vec<ScriptStep> {
        use ScriptStep::{Act, Wait};

        match self {
            ScenarioId::CopdDeterioration => vec![
                Act(UserAction::new(ActionType::ReviewInPerson, "pt_001")),
                Act(UserAction::new(ActionType::RequestInvestigation, "pt_001")
                    .with_detail("investigation_type", "ABG")),
                Wait(25),
                Act(UserAction::new(ActionType::DocumentNote, "pt_001")
                    .with_detail("note_content", "ABG reviewed: compensated type 2 failure")),
                Wait(40),
                Act(UserAction::new(ActionType::AskNurseQuestion, "pt_001")
                    .with_nurse_response("She looks more tired, sats 86% on 2L", 2)),
                Act(UserAction::new(ActionType::Escalate, "pt_001")
                    .with_detail("reason", "Rising CO2, needs NIV assessment")),
                Wait(20),
                Act(UserAction::new(ActionType::ReviewInPerson, "pt_001").with_time_cost(15)),
            ],
            ScenarioId::SepsisDeadline => vec![
                Act(UserAction::new(ActionType::ReviewInPerson, "pt_101")),
                Act(UserAction::new(ActionType::RequestInvestigation, "pt_101")
                    .with_detail("investigation_type", "Lactate")
                    .with_detail("turnaround_minutes", 10)),
                Wait(15),
                Act(UserAction::new(ActionType::Escalate, "pt_101")
                    .with_detail("reason", "Lactate 4.1, hypotensive")),
                Wait(30),
                Act(UserAction::new(ActionType::DocumentNote, "pt_101")
                    .with_detail("note_content", "Sepsis six started, senior aware")),
            ],
            ScenarioId::BusyNight => vec![
                Act(UserAction::new(ActionType::ReviewInPerson, "pt_201")),
                Act(UserAction::new(ActionType::ReviewInPerson, "pt_202")),
                Act(UserAction::new(ActionType::RequestInvestigation, "pt_202")
                    .with_detail("investigation_type", "ECG")),
                Wait(10),
                Act(UserAction::new(ActionType::AskNurseQuestion, "pt_203")
                    .with_nurse_response("Still asking for her family, obs stable", 1)),
                Act(UserAction::new(ActionType::ReviewInPerson, "pt_204")),
                Act(UserAction::new(ActionType::DocumentNote, "pt_204")
                    .with_detail("note_content", "Hypoglycaemia treated, BM 6.2")),
            ],
        }
    }

    /// Patient states the script must leave behind.
    pub fn expectations(&self) -> Vec<Expectation> {
        match self {
            ScenarioId::CopdDeterioration => {
                vec![Expectation::new("pt_001", PatientState::Stable)]
            }
            ScenarioId::SepsisDeadline => {
                vec![Expectation::new("pt_101", PatientState::StableWithConcerns)]
            }
            ScenarioId::BusyNight => vec![
                Expectation::new("pt_201", PatientState::StableWithConcerns),
                Expectation::new("pt_202", PatientState::Deteriorating),
                Expectation::new("pt_203", PatientState::Stable),
                Expectation::new("pt_204", PatientState::Stable),
            ],
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copd_deterioration" | "copd" => Ok(ScenarioId::CopdDeterioration),
            "sepsis_deadline" | "sepsis" => Ok(ScenarioId::SepsisDeadline),
            "busy_night" | "busy" => Ok(ScenarioId::BusyNight),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

fn after(minutes: i64) -> NaiveDateTime {
    default_start_time() + Duration::minutes(minutes)
}

fn object(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

fn demographics(name: &str, mrn: &str, age: u32, gender: &str, ward: &str, bed: &str) -> Demographics {
    Demographics {
        name: name.to_string(),
        mrn: mrn.to_string(),
        age,
        gender: gender.to_string(),
        ward: ward.to_string(),
        bed: bed.to_string(),
    }
}

fn findings(note: &str, examination: &str, observations: &str) -> Payload {
    object(json!({
        "in_person_note": note,
        "in_person_examination": examination,
        "observations": observations,
    }))
}

fn clerking(note_id: &str, at: NaiveDateTime, author: &str, content: Value) -> ClinicalNote {
    ClinicalNote {
        note_id: note_id.to_string(),
        note_type: NoteType::Admission,
        timestamp: at,
        author: author.to_string(),
        author_role: "FY1".to_string(),
        title: NoteType::Admission.default_title().to_string(),
        content,
        visibility_rule: VisibilityRule::Always,
    }
}

fn medication(name: &str, dose: &str) -> oncall_core::ehr::Medication {
    [("name", name), ("dose", dose)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn copd_deterioration() -> ScenarioDefinition {
    let start = default_start_time();
    let admitted = start - Duration::hours(5);

    let abg_concerning = InvestigationTemplate {
        result_data: object(json!({"pH": 7.34, "pCO2": 6.9, "pO2": 8.4, "HCO3": 29})),
        interpretation: Some("Compensated type 2 respiratory failure".to_string()),
        abnormal_flags: vec!["High pCO2".to_string(), "Low pO2".to_string()],
    };
    let abg_deteriorating = InvestigationTemplate {
        result_data: object(json!({"pH": 7.26, "pCO2": 8.9, "pO2": 7.6, "HCO3": 30})),
        interpretation: Some("Acute on chronic type 2 respiratory failure".to_string()),
        abnormal_flags: vec!["Low pH".to_string(), "High pCO2".to_string(), "Low pO2".to_string()],
    };

    let margaret = PatientDefinition::new(
        "pt_001",
        demographics("Margaret Thompson", "MRN12345", 72, "Female", "Ward 4A", "Bed 12"),
        PatientState::StableWithConcerns,
    )
    .with_background(
        &["Penicillin"],
        &["COPD", "Type 2 diabetes"],
        vec![
            medication("Salbutamol", "2.5mg nebulised QDS"),
            medication("Prednisolone", "30mg OD"),
        ],
    )
    .with_rule(
        StateChangeRule::time_elapsed("copd_worse", after(90), PatientState::Deteriorating)
            .requiring(PatientState::StableWithConcerns)
            .with_notification("Nurse: Margaret in Bed 12 is more breathless and drowsy", Urgency::High)
            .with_manifestation("Increasing drowsiness, RR 28, SpO2 85% on 2L"),
    )
    .with_rule(
        StateChangeRule::action_taken("niv_started", ActionType::Escalate, PatientState::Stable)
            .requiring(PatientState::Deteriorating)
            .with_notification("Registrar: started NIV for Margaret, gas improving", Urgency::Medium),
    )
    .with_findings(
        PatientState::StableWithConcerns,
        findings(
            "Tired but completing sentences",
            "Widespread expiratory wheeze, no accessory muscle use",
            "RR 22, SpO2 89% on 2L, HR 96, BP 138/84, Temp 37.2, Alert",
        ),
    )
    .with_findings(
        PatientState::Deteriorating,
        findings(
            "Drowsy, speaking in words only",
            "Reduced air entry bilaterally, flapping tremor",
            "RR 28, SpO2 85% on 2L, HR 118, BP 150/90, Temp 37.4, CVPU",
        ),
    )
    .with_findings(
        PatientState::Stable,
        findings(
            "Settled on NIV",
            "Improved air entry, wheeze persists",
            "RR 18, SpO2 90% on NIV, HR 88, BP 130/80, Temp 37.0, Alert",
        ),
    )
    .with_investigation(PatientState::StableWithConcerns, "ABG", abg_concerning)
    .with_investigation(PatientState::Deteriorating, "ABG", abg_deteriorating)
    .with_note(clerking(
        "note_clerk_001",
        admitted,
        "Dr. James Wilson",
        json!({
            "presenting_complaint": "Three days of increasing breathlessness",
            "plan": "Nebulisers, steroids, target sats 88-92%",
        }),
    ));

    ScenarioDefinition::new("copd_deterioration", "COPD exacerbation on Ward 4A", start)
        .with_description("A known CO2 retainer on too much oxygen")
        .with_patient(margaret)
}

fn sepsis_deadline() -> ScenarioDefinition {
    let start = default_start_time();

    let arthur = PatientDefinition::new(
        "pt_101",
        demographics("Arthur Bennett", "MRN55021", 64, "Male", "Ward 7B", "Bed 4"),
        PatientState::StableWithConcerns,
    )
    .with_background(
        &["NKDA"],
        &["Day 2 post right hemicolectomy"],
        vec![medication("Paracetamol", "1g QDS"), medication("Enoxaparin", "40mg OD")],
    )
    .with_rule(
        StateChangeRule::action_not_taken_by(
            "septic_shock",
            ActionType::Escalate,
            after(60),
            PatientState::CriticallyUnwell,
        )
        .requiring(PatientState::StableWithConcerns)
        .with_notification("Nurse: Arthur's BP is 78/40, he's clammy and confused", Urgency::Critical)
        .with_manifestation("Septic shock, suspected anastomotic leak"),
    )
    .with_rule(
        StateChangeRule::action_taken("pressors", ActionType::Escalate, PatientState::Deteriorating)
            .requiring(PatientState::CriticallyUnwell)
            .with_notification("ICU registrar: Arthur on noradrenaline, MAP improving", Urgency::High),
    )
    .with_findings(
        PatientState::StableWithConcerns,
        findings(
            "Feels hot and shivery, abdominal pain worse",
            "Tender around wound, guarding in RIF",
            "RR 24, SpO2 95%, HR 112, BP 102/64, Temp 38.6, Alert",
        ),
    )
    .with_findings(
        PatientState::CriticallyUnwell,
        findings(
            "Confused, unable to give history",
            "Peritonitic, mottled peripheries",
            "RR 30, SpO2 91%, HR 134, BP 78/40, Temp 39.1, CVPU",
        ),
    )
    .with_investigation(
        PatientState::StableWithConcerns,
        "Lactate",
        InvestigationTemplate {
            result_data: object(json!({"lactate": 4.1})),
            interpretation: Some("Raised lactate".to_string()),
            abnormal_flags: vec!["High lactate".to_string()],
        },
    );

    ScenarioDefinition::new("sepsis_deadline", "Post-operative sepsis", start)
        .with_description("Escalate before 21:00 or the patient becomes critical")
        .with_patient(arthur)
}

fn busy_night() -> ScenarioDefinition {
    let start = default_start_time();

    let doris = PatientDefinition::new(
        "pt_201",
        demographics("Doris Hughes", "MRN30117", 88, "Female", "Ward 2", "Bed 1"),
        PatientState::Stable,
    )
    .with_rule(
        StateChangeRule::time_elapsed("fall", after(40), PatientState::StableWithConcerns)
            .with_notification("Nurse: Doris found on the floor beside her bed", Urgency::High),
    )
    .with_findings(
        PatientState::Stable,
        findings("Comfortable", "No new findings", "RR 16, SpO2 96%, HR 78, BP 128/76, Temp 36.8, Alert"),
    );

    let raj = PatientDefinition::new(
        "pt_202",
        demographics("Raj Patel", "MRN40988", 58, "Male", "Ward 2", "Bed 6"),
        PatientState::StableWithConcerns,
    )
    .with_background(&[], &["Hypertension"], vec![medication("Ramipril", "5mg OD")])
    .with_findings(
        PatientState::StableWithConcerns,
        findings(
            "Central chest tightness since 19:30",
            "Heart sounds normal, chest clear",
            "RR 18, SpO2 97%, HR 96, BP 162/94, Temp 36.7, Alert",
        ),
    );

    let elsie = PatientDefinition::new(
        "pt_203",
        demographics("Elsie Carter", "MRN22354", 91, "Female", "Ward 2", "Bed 9"),
        PatientState::Stable,
    );

    let tom = PatientDefinition::new(
        "pt_204",
        demographics("Tom Whitaker", "MRN61203", 35, "Male", "Ward 3", "Bed 2"),
        PatientState::StableWithConcerns,
    )
    .with_background(&["Latex"], &["Type 1 diabetes"], vec![medication("Insulin glargine", "22 units ON")])
    .with_rule(
        StateChangeRule::action_taken("glucose_given", ActionType::ReviewInPerson, PatientState::Stable)
            .requiring(PatientState::StableWithConcerns),
    )
    .with_findings(
        PatientState::StableWithConcerns,
        findings(
            "Sweaty and confused, BM 2.1",
            "No focal neurology",
            "RR 18, SpO2 98%, HR 104, BP 124/70, Temp 36.4, Alert",
        ),
    );

    ScenarioDefinition::new("busy_night", "Busy night on Ward 2", start)
        .with_description("More bleeps than hands")
        .with_patient(doris)
        .with_patient(raj)
        .with_patient(elsie)
        .with_patient(tom)
        .with_event(
            EventDefinition::new(EventKind::NewRequest, after(15), "pt_203")
                .with_data("notification_message", "Nurse: Elsie's family want an update")
                .with_data("urgency", "low"),
        )
        .with_event(
            EventDefinition::new(EventKind::PatientDeterioration, after(45), "pt_202")
                .with_data("new_state", "deteriorating")
                .with_data("notification_message", "Nurse: Raj has new ST depression and ongoing pain")
                .with_data("urgency", "high"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
        assert_eq!("COPD".parse::<ScenarioId>(), Ok(ScenarioId::CopdDeterioration));
        assert!("time_warp".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_definitions_are_valid() {
        for scenario in ScenarioId::all() {
            let def = scenario.definition();
            assert!(def.validate().is_ok(), "{} invalid", scenario);
            assert_eq!(def.scenario_id, scenario.name());
        }
    }

    #[test]
    fn test_scripts_only_touch_known_patients() {
        for scenario in ScenarioId::all() {
            let def = scenario.definition();
            let known = |id: &str| def.patients.iter().any(|p| p.patient_id.as_str() == id);

            for step in scenario.script() {
                if let ScriptStep::Act(action) = step {
                    assert!(known(action.patient_id.as_str()), "{}: {}", scenario, action.patient_id);
                    assert!(action.validate().is_ok());
                }
            }
            for expectation in scenario.expectations() {
                assert!(known(expectation.patient_id));
            }
        }
    }

    #[test]
    fn test_busy_night_events_after_start() {
        let def = ScenarioId::BusyNight.definition();
        assert_eq!(def.scheduled_events.len(), 2);
        assert!(def.scheduled_events.iter().all(|e| e.scheduled_time > def.start_time));
    }
}
