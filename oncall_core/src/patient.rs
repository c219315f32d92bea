//! Patients and their rule-driven clinical state machine.
//!
//! A patient sits in one of four discrete states. Not a physiology model,
//! just the points at which a clinical decision matters. Transitions come from
//! a declarative trajectory of [`StateChangeRule`]s authored in scenario data.
//!
//! # Evaluation order
//!
//! ```text
//! TimeElapsed rules        (every due rule, scenario order, one-shot)
//!        │
//! ActionTaken rules        (first rule matching the executed action)
//!        │
//! ActionNotTakenByDeadline (every due rule, scenario order, one-shot)
//!        │
//! re-run one-shot categories until nothing changes
//! ```
//!
//! Each category sees the state left behind by the one before it, so when two
//! categories disagree the one evaluated last wins.

use crate::actions::{ActionRecord, ActionType};
use crate::ehr::{InvestigationTemplate, PatientRecord};
use crate::scheduler::Payload;
use chrono::NaiveDateTime;
use oncall_env::PatientId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Discrete clinical state of a simulated patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientState {
    Stable,
    StableWithConcerns,
    Deteriorating,
    CriticallyUnwell,
}

impl PatientState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientState::Stable => "stable",
            PatientState::StableWithConcerns => "stable_with_concerns",
            PatientState::Deteriorating => "deteriorating",
            PatientState::CriticallyUnwell => "critically_unwell",
        }
    }
}

impl std::fmt::Display for PatientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PatientState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(PatientState::Stable),
            "stable_with_concerns" => Ok(PatientState::StableWithConcerns),
            "deteriorating" => Ok(PatientState::Deteriorating),
            "critically_unwell" => Ok(PatientState::CriticallyUnwell),
            _ => Err(format!("Unknown patient state: {}", s)),
        }
    }
}

/// How loudly a state change is announced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// What makes a rule fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger_type", rename_all = "snake_case")]
pub enum RuleTrigger {
    /// Fires once the clock reaches `trigger_time`
    TimeElapsed { trigger_time: NaiveDateTime },

    /// Fires whenever the trainee performs `required_action` on this patient
    ActionTaken { required_action: ActionType },

    /// Fires once if `required_action` was never performed by `action_deadline`
    #[serde(alias = "action_not_taken")]
    ActionNotTakenByDeadline {
        required_action: ActionType,
        action_deadline: NaiveDateTime,
    },
}

/// Declarative transition rule from scenario data.
///
/// Rules are stateless; the patient remembers which one-shot rules have fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeRule {
    pub rule_id: String,

    #[serde(flatten)]
    pub trigger: RuleTrigger,

    /// Target state
    pub new_state: PatientState,

    /// Only apply while the patient is in this state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state_requirement: Option<PatientState>,

    /// What the trainee would observe; copied into the state history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_manifestation: Option<String>,

    /// Message pushed to the trainee when the rule fires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_message: Option<String>,

    #[serde(default)]
    pub urgency: Urgency,
}

impl StateChangeRule {
    fn with_trigger(rule_id: &str, trigger: RuleTrigger, new_state: PatientState) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            trigger,
            new_state,
            current_state_requirement: None,
            clinical_manifestation: None,
            notification_message: None,
            urgency: Urgency::default(),
        }
    }

    pub fn time_elapsed(rule_id: &str, trigger_time: NaiveDateTime, new_state: PatientState) -> Self {
        Self::with_trigger(rule_id, RuleTrigger::TimeElapsed { trigger_time }, new_state)
    }

    pub fn action_taken(rule_id: &str, required_action: ActionType, new_state: PatientState) -> Self {
        Self::with_trigger(rule_id, RuleTrigger::ActionTaken { required_action }, new_state)
    }

    pub fn action_not_taken_by(
        rule_id: &str,
        required_action: ActionType,
        action_deadline: NaiveDateTime,
        new_state: PatientState,
    ) -> Self {
        Self::with_trigger(
            rule_id,
            RuleTrigger::ActionNotTakenByDeadline {
                required_action,
                action_deadline,
            },
            new_state,
        )
    }

    pub fn requiring(mut self, state: PatientState) -> Self {
        self.current_state_requirement = Some(state);
        self
    }

    pub fn with_notification(mut self, message: &str, urgency: Urgency) -> Self {
        self.notification_message = Some(message.to_string());
        self.urgency = urgency;
        self
    }

    pub fn with_manifestation(mut self, manifestation: &str) -> Self {
        self.clinical_manifestation = Some(manifestation.to_string());
        self
    }
}

/// Why a transition happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionReason {
    TimeElapsed,
    ActionTaken { action: ActionType },
    ActionNotTakenByDeadline { action: ActionType },
    ScheduledDeterioration { event_id: String },
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionReason::TimeElapsed => f.write_str("time elapsed"),
            TransitionReason::ActionTaken { action } => write!(f, "action taken: {}", action),
            TransitionReason::ActionNotTakenByDeadline { action } => {
                write!(f, "action not taken by deadline: {}", action)
            }
            TransitionReason::ScheduledDeterioration { .. } => f.write_str("scheduled deterioration"),
        }
    }
}

/// Entry in a patient's append-only state history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub timestamp: NaiveDateTime,
    pub old_state: PatientState,
    pub new_state: PatientState,
    pub reason: TransitionReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_notes: Option<String>,
}

/// A transition applied during evaluation, with what to tell the trainee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub change: StateChange,
    pub notification: Option<String>,
    pub urgency: Urgency,
}

/// Everything scenario data says about how one patient evolves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Ordered transition rules
    #[serde(default, alias = "state_change_rules")]
    pub rules: Vec<StateChangeRule>,

    /// What an in-person review finds, per state (`in_person_note`,
    /// `in_person_examination`, `observations`, ...)
    #[serde(default)]
    pub examination_findings: HashMap<PatientState, Payload>,

    /// Result templates per state, keyed by investigation type
    #[serde(default)]
    pub investigation_templates: HashMap<PatientState, HashMap<String, InvestigationTemplate>>,
}

impl Trajectory {
    pub fn new(rules: Vec<StateChangeRule>) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn examination_findings(&self, state: PatientState) -> Option<&Payload> {
        self.examination_findings.get(&state)
    }

    pub fn investigation_template(
        &self,
        state: PatientState,
        investigation: &str,
    ) -> Option<&InvestigationTemplate> {
        self.investigation_templates
            .get(&state)
            .and_then(|templates| templates.get(investigation))
    }
}

/// Always-visible identifying details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    pub name: String,
    pub mrn: String,
    pub age: u32,
    pub gender: String,
    pub ward: String,
    pub bed: String,
}

/// A simulated patient: demographics, state machine and EHR record.
#[derive(Debug, Clone)]
pub struct Patient {
    pub id: PatientId,
    pub demographics: Demographics,
    current_state: PatientState,
    state_history: Vec<StateChange>,
    actions_taken: Vec<ActionRecord>,
    trajectory: Trajectory,
    record: PatientRecord,
    /// Indices of one-shot rules that have already fired
    fired: BTreeSet<usize>,
}

impl Patient {
    pub fn new(
        id: impl Into<PatientId>,
        demographics: Demographics,
        initial_state: PatientState,
        trajectory: Trajectory,
    ) -> Self {
        Self {
            id: id.into(),
            demographics,
            current_state: initial_state,
            state_history: Vec::new(),
            actions_taken: Vec::new(),
            trajectory,
            record: PatientRecord::default(),
            fired: BTreeSet::new(),
        }
    }

    /// Attaches the patient's seeded EHR record.
    pub fn with_record(mut self, record: PatientRecord) -> Self {
        self.record = record;
        self
    }

    pub fn current_state(&self) -> PatientState {
        self.current_state
    }

    pub fn state_history(&self) -> &[StateChange] {
        &self.state_history
    }

    pub fn actions_taken(&self) -> &[ActionRecord] {
        &self.actions_taken
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn record(&self) -> &PatientRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut PatientRecord {
        &mut self.record
    }

    /// Action types in the order they were performed.
    pub fn action_types(&self) -> Vec<ActionType> {
        self.actions_taken.iter().map(|a| a.action_type).collect()
    }

    pub fn has_taken(&self, action: ActionType) -> bool {
        self.actions_taken.iter().any(|a| a.action_type == action)
    }

    /// Appends to the action log.
    pub fn record_action(&mut self, action_type: ActionType, timestamp: NaiveDateTime, details: Payload) {
        self.actions_taken.push(ActionRecord {
            action_type,
            timestamp,
            details,
        });
    }

    /// Moves the patient to `target`, recording history.
    ///
    /// Returns `None` (and records nothing) if the patient is already there.
    pub fn transition_to(
        &mut self,
        target: PatientState,
        now: NaiveDateTime,
        reason: TransitionReason,
        rule_id: Option<String>,
        clinical_notes: Option<String>,
    ) -> Option<StateChange> {
        if self.current_state == target {
            return None;
        }

        let change = StateChange {
            timestamp: now,
            old_state: self.current_state,
            new_state: target,
            reason,
            rule_id,
            clinical_notes,
        };

        debug!(
            "  {} {} -> {} ({})",
            self.id, change.old_state, change.new_state, change.reason
        );

        self.current_state = target;
        self.state_history.push(change.clone());
        Some(change)
    }

    /// Runs one evaluation pass of the trajectory.
    ///
    /// `action` is the action just executed on this patient, if any. Calling
    /// this again with the same `now` and no action changes nothing.
    pub fn evaluate(&mut self, now: NaiveDateTime, action: Option<ActionType>) -> Vec<Transition> {
        let mut applied = Vec::new();

        self.apply_time_rules(now, &mut applied);
        if let Some(action) = action {
            self.apply_action_rules(action, now, &mut applied);
        }
        self.apply_deadline_rules(now, &mut applied);

        // One-shot rules gated on a state reached earlier in this pass.
        // Terminates: every extra transition consumes an unfired rule.
        loop {
            let before = applied.len();
            self.apply_time_rules(now, &mut applied);
            self.apply_deadline_rules(now, &mut applied);
            if applied.len() == before {
                break;
            }
        }

        applied
    }

    fn requirement_met(&self, rule: &StateChangeRule) -> bool {
        rule.current_state_requirement
            .map_or(true, |required| required == self.current_state)
    }

    fn apply_rule(
        &mut self,
        rule: &StateChangeRule,
        now: NaiveDateTime,
        reason: TransitionReason,
    ) -> Option<Transition> {
        let change = self.transition_to(
            rule.new_state,
            now,
            reason,
            Some(rule.rule_id.clone()),
            rule.clinical_manifestation.clone(),
        )?;

        Some(Transition {
            change,
            notification: rule.notification_message.clone(),
            urgency: rule.urgency,
        })
    }

    fn apply_time_rules(&mut self, now: NaiveDateTime, applied: &mut Vec<Transition>) {
        for idx in 0..self.trajectory.rules.len() {
            let rule = &self.trajectory.rules[idx];
            let RuleTrigger::TimeElapsed { trigger_time } = rule.trigger else {
                continue;
            };
            if trigger_time > now || self.fired.contains(&idx) || !self.requirement_met(rule) {
                continue;
            }

            // A due rule is spent even if the patient already sits in its target.
            let rule = rule.clone();
            self.fired.insert(idx);
            applied.extend(self.apply_rule(&rule, now, TransitionReason::TimeElapsed));
        }
    }

    fn apply_action_rules(&mut self, action: ActionType, now: NaiveDateTime, applied: &mut Vec<Transition>) {
        let matching = self.trajectory.rules.iter().find(|rule| {
            matches!(rule.trigger, RuleTrigger::ActionTaken { required_action } if required_action == action)
                && self.requirement_met(rule)
        });

        if let Some(rule) = matching.cloned() {
            applied.extend(self.apply_rule(&rule, now, TransitionReason::ActionTaken { action }));
        }
    }

    fn apply_deadline_rules(&mut self, now: NaiveDateTime, applied: &mut Vec<Transition>) {
        for idx in 0..self.trajectory.rules.len() {
            let rule = &self.trajectory.rules[idx];
            let RuleTrigger::ActionNotTakenByDeadline {
                required_action,
                action_deadline,
            } = rule.trigger
            else {
                continue;
            };
            if now < action_deadline
                || self.fired.contains(&idx)
                || self.has_taken(required_action)
                || !self.requirement_met(rule)
            {
                continue;
            }

            let rule = rule.clone();
            self.fired.insert(idx);
            applied.extend(self.apply_rule(
                &rule,
                now,
                TransitionReason::ActionNotTakenByDeadline {
                    action: required_action,
                },
            ));
        }
    }

    /// Text of the note an in-person review produces in the current state.
    pub fn examination_note_content(&self) -> String {
        let Some(findings) = self.trajectory.examination_findings(self.current_state) else {
            return format!(
                "Patient reviewed in person. Current state: {}",
                self.current_state
            );
        };

        let section = |key: &str, heading: &str| {
            findings
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|text| !text.is_empty())
                .map(|text| format!("{}\n{}", heading, text))
        };

        let parts: Vec<String> = [
            section("in_person_note", "Notes"),
            section("in_person_examination", "Examination"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            "Patient reviewed in person".to_string()
        } else {
            parts.join("\n\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;

    fn demographics() -> Demographics {
        Demographics {
            name: "Margaret Thompson".to_string(),
            mrn: "MRN12345".to_string(),
            age: 72,
            gender: "Female".to_string(),
            ward: "Ward 4A".to_string(),
            bed: "Bed 12".to_string(),
        }
    }

    fn patient(initial: PatientState, rules: Vec<StateChangeRule>) -> Patient {
        Patient::new("pt_001", demographics(), initial, Trajectory::new(rules))
    }

    #[test]
    fn test_patient_initialization() {
        let p = patient(PatientState::Stable, vec![]);
        assert_eq!(p.current_state(), PatientState::Stable);
        assert!(p.state_history().is_empty());
        assert!(p.actions_taken().is_empty());
    }

    #[test]
    fn test_time_based_state_change() {
        let rule = StateChangeRule::time_elapsed("r1", at(21, 30), PatientState::Deteriorating)
            .requiring(PatientState::StableWithConcerns)
            .with_manifestation("More breathless");
        let mut p = patient(PatientState::StableWithConcerns, vec![rule]);

        assert!(p.evaluate(at(21, 0), None).is_empty());
        assert_eq!(p.current_state(), PatientState::StableWithConcerns);

        let applied = p.evaluate(at(21, 35), None);
        assert_eq!(applied.len(), 1);
        assert_eq!(p.current_state(), PatientState::Deteriorating);

        let history = p.state_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_state, PatientState::StableWithConcerns);
        assert_eq!(history[0].new_state, PatientState::Deteriorating);
        assert_eq!(history[0].reason.to_string(), "time elapsed");
        assert_eq!(history[0].timestamp, at(21, 35));
        assert_eq!(history[0].clinical_notes.as_deref(), Some("More breathless"));
    }

    #[test]
    fn test_time_rule_fires_once() {
        let rules = vec![
            StateChangeRule::time_elapsed("worse", at(21, 0), PatientState::Deteriorating),
            StateChangeRule::action_taken("escalated", ActionType::Escalate, PatientState::Stable),
        ];
        let mut p = patient(PatientState::StableWithConcerns, rules);

        p.evaluate(at(21, 5), None);
        assert_eq!(p.current_state(), PatientState::Deteriorating);

        p.evaluate(at(21, 10), Some(ActionType::Escalate));
        assert_eq!(p.current_state(), PatientState::Stable);

        // The 21:00 rule is spent; later passes leave the patient stable
        assert!(p.evaluate(at(22, 0), None).is_empty());
        assert_eq!(p.current_state(), PatientState::Stable);
    }

    #[test]
    fn test_action_rule_is_idempotent() {
        let rule = StateChangeRule::action_taken("esc", ActionType::Escalate, PatientState::Stable);
        let mut p = patient(PatientState::Deteriorating, vec![rule]);

        assert_eq!(p.evaluate(at(20, 10), Some(ActionType::Escalate)).len(), 1);
        assert!(p.evaluate(at(20, 20), Some(ActionType::Escalate)).is_empty());
        assert_eq!(p.state_history().len(), 1);
        assert_eq!(p.state_history()[0].reason.to_string(), "action taken: escalate");
    }

    #[test]
    fn test_action_rule_ignores_other_actions() {
        let rule = StateChangeRule::action_taken("esc", ActionType::Escalate, PatientState::Stable);
        let mut p = patient(PatientState::Deteriorating, vec![rule]);

        assert!(p.evaluate(at(20, 10), Some(ActionType::DocumentNote)).is_empty());
        assert_eq!(p.current_state(), PatientState::Deteriorating);
    }

    #[test]
    fn test_first_matching_action_rule_wins() {
        let rules = vec![
            StateChangeRule::action_taken("a", ActionType::Escalate, PatientState::Stable),
            StateChangeRule::action_taken("b", ActionType::Escalate, PatientState::CriticallyUnwell),
        ];
        let mut p = patient(PatientState::Deteriorating, rules);

        p.evaluate(at(20, 10), Some(ActionType::Escalate));
        assert_eq!(p.current_state(), PatientState::Stable);
        assert_eq!(p.state_history().len(), 1);
    }

    #[test]
    fn test_deadline_rule_fires_when_action_missing() {
        let rule = StateChangeRule::action_not_taken_by(
            "no_escalation",
            ActionType::Escalate,
            at(21, 0),
            PatientState::CriticallyUnwell,
        )
        .with_notification("Crash call!", Urgency::Critical);
        let mut p = patient(PatientState::Deteriorating, vec![rule]);

        assert!(p.evaluate(at(20, 59), None).is_empty());

        let applied = p.evaluate(at(21, 0), None);
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].notification.as_deref(), Some("Crash call!"));
        assert_eq!(applied[0].urgency, Urgency::Critical);
        assert_eq!(p.current_state(), PatientState::CriticallyUnwell);
    }

    #[test]
    fn test_deadline_rule_fires_at_most_once() {
        let rules = vec![
            StateChangeRule::action_not_taken_by(
                "no_escalation",
                ActionType::Escalate,
                at(21, 0),
                PatientState::CriticallyUnwell,
            ),
            StateChangeRule::action_taken("abg", ActionType::RequestInvestigation, PatientState::Deteriorating),
        ];
        let mut p = patient(PatientState::Deteriorating, rules);

        p.evaluate(at(21, 5), None);
        assert_eq!(p.current_state(), PatientState::CriticallyUnwell);

        p.record_action(ActionType::RequestInvestigation, at(21, 10), Payload::new());
        p.evaluate(at(21, 10), Some(ActionType::RequestInvestigation));
        assert_eq!(p.current_state(), PatientState::Deteriorating);

        // Still no escalation, still past the deadline, but the rule is spent
        assert!(p.evaluate(at(23, 0), None).is_empty());
        assert_eq!(p.current_state(), PatientState::Deteriorating);
    }

    #[test]
    fn test_deadline_rule_suppressed_by_action() {
        let rule = StateChangeRule::action_not_taken_by(
            "no_escalation",
            ActionType::Escalate,
            at(21, 0),
            PatientState::CriticallyUnwell,
        );
        let mut p = patient(PatientState::Deteriorating, vec![rule]);

        p.record_action(ActionType::Escalate, at(20, 30), Payload::new());
        assert!(p.evaluate(at(21, 30), None).is_empty());
        assert_eq!(p.current_state(), PatientState::Deteriorating);
    }

    #[test]
    fn test_later_category_wins() {
        // Time rule stabilizes, deadline rule then overrides within the same pass
        let rules = vec![
            StateChangeRule::time_elapsed("t", at(21, 0), PatientState::Stable),
            StateChangeRule::action_not_taken_by("d", ActionType::Escalate, at(21, 0), PatientState::Deteriorating),
        ];
        let mut p = patient(PatientState::StableWithConcerns, rules);

        let applied = p.evaluate(at(21, 0), None);
        assert_eq!(applied.len(), 2);
        assert_eq!(p.current_state(), PatientState::Deteriorating);
    }

    #[test]
    fn test_state_gated_rule_fires_in_same_pass() {
        let rules = vec![
            StateChangeRule::time_elapsed("second", at(21, 0), PatientState::CriticallyUnwell)
                .requiring(PatientState::Deteriorating),
            StateChangeRule::time_elapsed("first", at(20, 30), PatientState::Deteriorating),
        ];
        let mut p = patient(PatientState::StableWithConcerns, rules);

        p.evaluate(at(21, 30), None);
        assert_eq!(p.current_state(), PatientState::CriticallyUnwell);
        assert_eq!(p.state_history().len(), 2);

        assert!(p.evaluate(at(21, 30), None).is_empty());
    }

    #[test]
    fn test_non_linear_transitions() {
        let rule = StateChangeRule::time_elapsed("recover", at(20, 5), PatientState::Stable);
        let mut p = patient(PatientState::CriticallyUnwell, vec![rule]);

        p.evaluate(at(20, 5), None);
        assert_eq!(p.current_state(), PatientState::Stable);
    }

    #[test]
    fn test_examination_note_uses_state_template() {
        let mut trajectory = Trajectory::default();
        let mut findings = Payload::new();
        findings.insert("in_person_note".into(), "Looks tired".into());
        findings.insert("in_person_examination".into(), "Wheeze bilaterally".into());
        trajectory
            .examination_findings
            .insert(PatientState::StableWithConcerns, findings);

        let p = Patient::new("pt_001", demographics(), PatientState::StableWithConcerns, trajectory);
        assert_eq!(
            p.examination_note_content(),
            "Notes\nLooks tired\n\nExamination\nWheeze bilaterally"
        );
    }

    #[test]
    fn test_examination_note_falls_back_to_default() {
        let p = patient(PatientState::Deteriorating, vec![]);
        assert_eq!(
            p.examination_note_content(),
            "Patient reviewed in person. Current state: deteriorating"
        );
    }

    #[test]
    fn test_rule_deserializes_from_scenario_json() {
        let rule: StateChangeRule = serde_json::from_str(
            r#"{
                "rule_id": "rule_001",
                "trigger_type": "action_not_taken",
                "required_action": "escalate",
                "action_deadline": "2024-01-15T21:00:00",
                "new_state": "critically_unwell",
                "notification_message": "Crash call",
                "urgency": "critical"
            }"#,
        )
        .unwrap();

        assert_eq!(
            rule.trigger,
            RuleTrigger::ActionNotTakenByDeadline {
                required_action: ActionType::Escalate,
                action_deadline: at(21, 0),
            }
        );
        assert_eq!(rule.urgency, Urgency::Critical);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn state() -> impl Strategy<Value = PatientState> {
            prop_oneof![
                Just(PatientState::Stable),
                Just(PatientState::StableWithConcerns),
                Just(PatientState::Deteriorating),
                Just(PatientState::CriticallyUnwell),
            ]
        }

        fn action() -> impl Strategy<Value = ActionType> {
            prop_oneof![
                Just(ActionType::ReviewInPerson),
                Just(ActionType::RequestInvestigation),
                Just(ActionType::Escalate),
            ]
        }

        fn rule() -> impl Strategy<Value = StateChangeRule> {
            prop_oneof![
                (0i64..180, state(), proptest::option::of(state())).prop_map(|(m, s, g)| {
                    let mut r = StateChangeRule::time_elapsed("t", at(20, 0) + chrono::Duration::minutes(m), s);
                    r.current_state_requirement = g;
                    r
                }),
                (action(), state(), proptest::option::of(state())).prop_map(|(a, s, g)| {
                    let mut r = StateChangeRule::action_taken("a", a, s);
                    r.current_state_requirement = g;
                    r
                }),
                (action(), 0i64..180, state(), proptest::option::of(state())).prop_map(|(a, m, s, g)| {
                    let mut r = StateChangeRule::action_not_taken_by("d", a, at(20, 0) + chrono::Duration::minutes(m), s);
                    r.current_state_requirement = g;
                    r
                }),
            ]
        }

        proptest! {
            #[test]
            fn prop_reevaluation_without_news_is_a_no_op(
                initial in state(),
                rules in proptest::collection::vec(rule(), 0..8),
                steps in proptest::collection::vec((0i64..30, proptest::option::of(action())), 1..10),
            ) {
                let mut p = patient(initial, rules);
                let mut now = at(20, 0);

                for (delta, act) in steps {
                    now += chrono::Duration::minutes(delta);
                    if let Some(a) = act {
                        p.record_action(a, now, Payload::new());
                    }
                    p.evaluate(now, act);

                    let state = p.current_state();
                    let history_len = p.state_history().len();
                    prop_assert!(p.evaluate(now, None).is_empty());
                    prop_assert_eq!(p.current_state(), state);
                    prop_assert_eq!(p.state_history().len(), history_len);
                }
            }
        }
    }
}
