//! The session orchestrator.
//!
//! A [`Session`] owns one clock, one event scheduler and the patients of one
//! scenario. [`Session::execute_action`] is its only writer path:
//!
//! ```text
//! validate ──► advance clock ──► record action ──► drain due events
//!                                                        │
//!  timeline ◄── revelation ◄── synthesize records ◄── evaluate patients
//! ```
//!
//! Validation runs before anything is touched, so a rejected action leaves
//! the session exactly as it was.

use crate::actions::{ActionResult, ActionType, StateChangeSummary, TriggeredEvent, UserAction};
use crate::clock::{ClockSnapshot, SimulationClock};
use crate::config::SessionConfig;
use crate::ehr::{
    ClinicalNote, InvestigationResult, InvestigationTemplate, NoteType, PatientRecordView,
    VisibilityRule, VisibilitySummary,
};
use crate::error::SimError;
use crate::patient::{Patient, PatientState, StateChange, Transition, TransitionReason, Urgency};
use crate::scenario::ScenarioDefinition;
use crate::scheduler::{EventKind, EventScheduler, Payload, ScheduledEvent, SchedulerSnapshot};
use chrono::{Duration, NaiveDateTime};
use oncall_env::{PatientId, SessionId, SimulationContext};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PatientStateChange,
    InvestigationResult,
    PatientDeterioration,
    NewRequest,
    EscalationResponse,
}

impl From<EventKind> for NotificationKind {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::InvestigationResult => NotificationKind::InvestigationResult,
            EventKind::PatientDeterioration => NotificationKind::PatientDeterioration,
            EventKind::NewRequest => NotificationKind::NewRequest,
            EventKind::EscalationResponse => NotificationKind::EscalationResponse,
        }
    }
}

/// Message pushed to the trainee's bleep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub timestamp: NaiveDateTime,
    pub kind: NotificationKind,
    pub patient_id: PatientId,
    pub message: String,
    pub urgency: Urgency,
}

/// One executed action, as recorded on the session timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub sequence: u64,
    pub timestamp: NaiveDateTime,
    pub elapsed_minutes: i64,
    pub action_type: ActionType,
    pub patient_id: PatientId,
    pub time_advanced_minutes: i64,
    pub artificial_minutes_added: u32,
    /// Estimated cost of the action, recorded whether or not it moved the clock
    #[serde(default)]
    pub time_cost_minutes: u32,
    #[serde(default)]
    pub details: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nurse_response: Option<String>,
    pub triggered_events: Vec<String>,
    pub state_changes: Vec<StateChangeSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSnapshot {
    pub patient_id: PatientId,
    pub name: String,
    pub mrn: String,
    pub ward: String,
    pub bed: String,
    pub current_state: PatientState,
    pub actions_taken: usize,
    pub state_changes: usize,
}

/// Point-in-time view of a whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub scenario_id: String,
    pub status: SessionStatus,
    pub clock: ClockSnapshot,
    pub scheduler: SchedulerSnapshot,
    pub patients: Vec<PatientSnapshot>,
    pub action_count: u64,
    pub notification_count: usize,
    pub pending_events: usize,
    pub is_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientOutcome {
    pub patient_id: PatientId,
    pub name: String,
    pub initial_state: PatientState,
    pub final_state: PatientState,
    pub state_changes: usize,
    pub actions_taken: usize,
    pub state_history: Vec<StateChange>,
}

/// Debrief produced when a session completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub scenario_id: String,
    pub status: SessionStatus,
    pub scenario_start_time: NaiveDateTime,
    pub final_time: NaiveDateTime,
    pub total_time_elapsed_minutes: i64,
    pub total_actions: u64,
    pub patients: Vec<PatientOutcome>,
    pub notifications: Vec<Notification>,
    pub timeline: Vec<TimelineEntry>,
}

/// A single trainee's run through one scenario.
pub struct Session {
    id: SessionId,
    scenario_id: String,
    config: SessionConfig,
    clock: SimulationClock,
    scheduler: EventScheduler,
    patients: BTreeMap<PatientId, Patient>,
    initial_states: BTreeMap<PatientId, PatientState>,
    timeline: Vec<TimelineEntry>,
    notifications: Vec<Notification>,
    status: SessionStatus,
    action_count: u64,
    context: Arc<dyn SimulationContext>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("scenario_id", &self.scenario_id)
            .field("status", &self.status)
            .field("clock", &self.clock)
            .field("patients", &self.patients.len())
            .field("action_count", &self.action_count)
            .finish_non_exhaustive()
    }
}

fn state_change_summary(
    patient: &Patient,
    change: &StateChange,
    message: String,
    urgency: Urgency,
) -> StateChangeSummary {
    StateChangeSummary {
        patient_id: patient.id.clone(),
        patient_name: patient.demographics.name.clone(),
        old_state: change.old_state,
        new_state: change.new_state,
        reason: change.reason.to_string(),
        message,
        urgency,
        time: change.timestamp,
    }
}

fn payload_urgency(payload: &Payload) -> Urgency {
    payload
        .get("urgency")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

impl Session {
    /// Builds a session from a scenario.
    ///
    /// The session clock starts at the context's current wall time; the
    /// simulated clock starts at `start_override` or the scenario's start time.
    pub fn from_scenario(
        scenario: &ScenarioDefinition,
        config: SessionConfig,
        context: Arc<dyn SimulationContext>,
        start_override: Option<NaiveDateTime>,
    ) -> Result<Self, SimError> {
        scenario.validate()?;

        let scenario_start = start_override.unwrap_or(scenario.start_time);
        let clock = SimulationClock::new(scenario_start, Arc::clone(&context));

        let mut patients = BTreeMap::new();
        let mut initial_states = BTreeMap::new();
        for def in &scenario.patients {
            let patient = Patient::new(
                def.patient_id.clone(),
                def.demographics.clone(),
                def.initial_state,
                def.trajectory.clone(),
            )
            .with_record(def.record.clone());
            initial_states.insert(def.patient_id.clone(), def.initial_state);
            patients.insert(def.patient_id.clone(), patient);
        }

        let mut scheduler = EventScheduler::new();
        for def in &scenario.scheduled_events {
            let id = def
                .event_id
                .clone()
                .unwrap_or_else(|| context.derive_id("evt"));
            scheduler.schedule(
                ScheduledEvent::new(id, def.scheduled_time, def.event_type, def.patient_id.clone())
                    .with_payload(def.data.clone()),
            );
        }

        let id = context.session_id();
        info!(
            "Session {} created: scenario={} patients={} events={} start={}",
            id,
            scenario.scenario_id,
            patients.len(),
            scheduler.len(),
            scenario_start.format("%Y-%m-%d %H:%M")
        );

        Ok(Self {
            id,
            scenario_id: scenario.scenario_id.clone(),
            config,
            clock,
            scheduler,
            patients,
            initial_states,
            timeline: Vec::new(),
            notifications: Vec::new(),
            status: SessionStatus::Active,
            action_count: 0,
            context,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Complete
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    pub fn patient(&self, patient_id: &str) -> Option<&Patient> {
        self.patients.get(patient_id)
    }

    /// Patients in id order.
    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn action_count(&self) -> u64 {
        self.action_count
    }

    fn ensure_active(&self) -> Result<(), SimError> {
        match self.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::Complete => Err(SimError::invalid_state(format!(
                "Session {} is already complete",
                self.id
            ))),
        }
    }

    fn require_patient(&self, patient_id: &str) -> Result<&Patient, SimError> {
        self.patients
            .get(patient_id)
            .ok_or_else(|| SimError::not_found(format!("patient {}", patient_id)))
    }

    /// Enqueues an event for a patient, returning its id.
    pub fn schedule_event(
        &mut self,
        kind: EventKind,
        patient_id: &str,
        due_time: NaiveDateTime,
        payload: Payload,
    ) -> Result<String, SimError> {
        self.ensure_active()?;
        let patient_id = self.require_patient(patient_id)?.id.clone();

        let id = self.context.derive_id("evt");
        self.scheduler
            .schedule(ScheduledEvent::new(id.clone(), due_time, kind, patient_id).with_payload(payload));
        Ok(id)
    }

    /// Executes one trainee action.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the session is complete
    /// - `NotFound` if the patient is not in this session
    /// - `Validation` if the action is missing a required detail
    pub fn execute_action(&mut self, action: UserAction) -> Result<ActionResult, SimError> {
        self.ensure_active()?;
        self.require_patient(action.patient_id.as_str())?;
        action.validate()?;

        let old_time = self.clock.now();
        let artificial = if action.action_type.advances_clock() {
            action
                .time_cost_minutes
                .unwrap_or(self.config.review_cost_minutes)
        } else {
            0
        };
        let now = if action.action_type.advances_clock() {
            self.clock.add_artificial_time(artificial)
        } else {
            old_time
        };
        let time_advanced = (now - old_time).num_minutes();

        if let Some(patient) = self.patients.get_mut(action.patient_id.as_str()) {
            patient.record_action(action.action_type, now, action.details.clone());
        }

        let mut touched: BTreeSet<PatientId> = BTreeSet::new();
        touched.insert(action.patient_id.clone());

        let mut triggered_events = Vec::new();
        let mut new_notifications = Vec::new();
        let mut state_changes = Vec::new();

        // One at a time: delivery can enqueue follow-ups due before the next head
        while let Some(event) = self.scheduler.pop_due(now) {
            touched.insert(event.patient_id.clone());
            let delivered = self.deliver_event(event, now, &mut state_changes);
            new_notifications.extend(delivered.notifications.iter().cloned());
            triggered_events.push(delivered);
        }

        for (patient_id, patient) in self.patients.iter_mut() {
            let executed = (*patient_id == action.patient_id).then_some(action.action_type);
            for Transition {
                change,
                notification,
                urgency,
            } in patient.evaluate(now, executed)
            {
                let message = notification.unwrap_or_else(|| {
                    format!("{} is now {}", patient.demographics.name, change.new_state)
                });
                self.notifications.push(Notification {
                    timestamp: now,
                    kind: NotificationKind::PatientStateChange,
                    patient_id: patient_id.clone(),
                    message: message.clone(),
                    urgency,
                });
                new_notifications.push(message.clone());
                state_changes.push(state_change_summary(patient, &change, message, urgency));
                touched.insert(patient_id.clone());
            }
        }

        self.synthesize_records(&action, now);

        let visibility = touched
            .iter()
            .filter_map(|id| self.patients.get(id))
            .map(|patient| VisibilitySummary::compute(patient, now))
            .collect();

        self.action_count += 1;
        self.timeline.push(TimelineEntry {
            sequence: self.action_count,
            timestamp: now,
            elapsed_minutes: self.clock.elapsed_minutes(),
            action_type: action.action_type,
            patient_id: action.patient_id.clone(),
            time_advanced_minutes: time_advanced,
            artificial_minutes_added: artificial,
            time_cost_minutes: action.time_cost(),
            details: action.details.clone(),
            nurse_response: action.nurse_response.as_ref().map(|r| r.response_text.clone()),
            triggered_events: triggered_events.iter().map(|e| e.event_id.clone()).collect(),
            state_changes: state_changes.clone(),
        });

        debug!(
            "Action #{} {} on {} at {}: +{} min, {} events, {} state changes",
            self.action_count,
            action.action_type,
            action.patient_id,
            now.format("%H:%M"),
            time_advanced,
            triggered_events.len(),
            state_changes.len()
        );

        Ok(ActionResult {
            success: true,
            message: format!("Action completed: {}", action.action_type),
            action,
            time_advanced_minutes: time_advanced,
            new_simulation_time: now,
            triggered_events,
            new_notifications,
            patient_state_changes: state_changes,
            visibility,
        })
    }

    fn deliver_event(
        &mut self,
        event: ScheduledEvent,
        now: NaiveDateTime,
        state_changes: &mut Vec<StateChangeSummary>,
    ) -> TriggeredEvent {
        let mut triggered = TriggeredEvent {
            event_id: event.id.clone(),
            kind: event.kind,
            patient_id: event.patient_id.clone(),
            due_time: event.due_time,
            notifications: Vec::new(),
        };

        self.schedule_follow_up(&event);

        let context = &self.context;
        let Some(patient) = self.patients.get_mut(event.patient_id.as_str()) else {
            warn!("Event {} names unknown patient {}; skipped", event.id, event.patient_id);
            return triggered;
        };

        let custom_message = event.payload_str("notification_message").map(str::to_string);
        let message = match event.kind {
            EventKind::InvestigationResult => {
                deliver_result(patient, &event, context.as_ref());
                custom_message.unwrap_or_else(|| {
                    format!("Investigation result available for patient {}", event.patient_id)
                })
            }
            EventKind::PatientDeterioration => {
                let message = custom_message
                    .unwrap_or_else(|| format!("{} has deteriorated", patient.demographics.name));
                match event.payload_str("new_state").map(str::parse::<PatientState>) {
                    Some(Ok(target)) => {
                        let change = patient.transition_to(
                            target,
                            now,
                            TransitionReason::ScheduledDeterioration {
                                event_id: event.id.clone(),
                            },
                            None,
                            event.payload_str("clinical_manifestation").map(str::to_string),
                        );
                        if let Some(change) = change {
                            state_changes.push(state_change_summary(
                                patient,
                                &change,
                                message.clone(),
                                payload_urgency(&event.payload),
                            ));
                        }
                    }
                    Some(Err(e)) => warn!("Deterioration event {} ignored: {}", event.id, e),
                    None => warn!("Deterioration event {} has no new_state", event.id),
                }
                message
            }
            EventKind::NewRequest => custom_message
                .unwrap_or_else(|| format!("New request for patient {}", event.patient_id)),
            EventKind::EscalationResponse => {
                custom_message.unwrap_or_else(|| "Senior doctor has reviewed patient".to_string())
            }
        };

        self.notifications.push(Notification {
            timestamp: now,
            kind: event.kind.into(),
            patient_id: event.patient_id.clone(),
            message: message.clone(),
            urgency: payload_urgency(&event.payload),
        });
        triggered.notifications.push(message);
        triggered
    }

    /// Enqueues the derivative event described by a `follow_up` payload entry.
    fn schedule_follow_up(&mut self, event: &ScheduledEvent) {
        let Some(follow_up) = event.payload.get("follow_up") else {
            return;
        };

        let kind = follow_up
            .get("kind")
            .and_then(Value::as_str)
            .map(str::parse::<EventKind>);
        let kind = match kind {
            Some(Ok(kind)) => kind,
            Some(Err(e)) => {
                warn!("Follow-up of event {} ignored: {}", event.id, e);
                return;
            }
            None => {
                warn!("Follow-up of event {} has no kind", event.id);
                return;
            }
        };

        let delay = follow_up
            .get("delay_minutes")
            .and_then(Value::as_i64)
            .unwrap_or(0)
            .max(0);
        let payload = match follow_up.get("data") {
            Some(Value::Object(data)) => data.clone(),
            _ => Payload::new(),
        };

        let id = self.context.derive_id("evt");
        self.scheduler.schedule(
            ScheduledEvent::new(
                id,
                event.due_time + Duration::minutes(delay),
                kind,
                event.patient_id.clone(),
            )
            .with_payload(payload),
        );
    }

    fn synthesize_records(&mut self, action: &UserAction, now: NaiveDateTime) {
        let context = &self.context;
        let config = &self.config;
        let Some(patient) = self.patients.get_mut(action.patient_id.as_str()) else {
            return;
        };

        match action.action_type {
            ActionType::ReviewInPerson => {
                let note = ClinicalNote {
                    note_id: context.derive_id("note"),
                    note_type: NoteType::Progress,
                    timestamp: now,
                    author: config.examiner_name.clone(),
                    author_role: config.examiner_role.clone(),
                    title: format!("In-Person Review at {}", now.format("%H:%M")),
                    content: Value::String(patient.examination_note_content()),
                    visibility_rule: VisibilityRule::Always,
                };
                patient.record_mut().add_note(note);
            }
            ActionType::DocumentNote => {
                let note_type = action
                    .detail_str("note_type")
                    .and_then(|s| s.parse::<NoteType>().ok())
                    .unwrap_or_default();
                let content = action.detail_str("note_content").unwrap_or_default();
                let note = ClinicalNote {
                    note_id: context.derive_id("note"),
                    note_type,
                    timestamp: now,
                    author: config.examiner_name.clone(),
                    author_role: config.examiner_role.clone(),
                    title: format!("Clinical Documentation - {}", now.format("%H:%M")),
                    content: json!({ "clinical_note": content }),
                    visibility_rule: VisibilityRule::Always,
                };
                patient.record_mut().add_note(note);
            }
            ActionType::RequestInvestigation => {
                let investigation = action.detail_str("investigation_type").unwrap_or_default();
                let turnaround = action
                    .details
                    .get("turnaround_minutes")
                    .and_then(Value::as_u64)
                    .and_then(|minutes| u32::try_from(minutes).ok())
                    .unwrap_or_else(|| config.turnaround_for(investigation));
                let resulted = now + Duration::minutes(i64::from(turnaround));

                let template = patient
                    .trajectory()
                    .investigation_template(patient.current_state(), investigation)
                    .cloned()
                    .unwrap_or_else(|| InvestigationTemplate::normal(investigation));

                let result_id = context.derive_id("result");
                patient.record_mut().add_result(InvestigationResult {
                    result_id: result_id.clone(),
                    investigation_type: investigation.to_string(),
                    requested_time: now,
                    resulted_time: Some(resulted),
                    result_data: template.result_data,
                    interpretation: template.interpretation,
                    abnormal_flags: template.abnormal_flags,
                    visibility_rule: VisibilityRule::TimeElapsed {
                        visible_after_time: resulted,
                    },
                });

                let mut payload = Payload::new();
                payload.insert("investigation_type".into(), investigation.into());
                payload.insert("result_id".into(), result_id.into());
                payload.insert(
                    "notification_message".into(),
                    format!(
                        "Investigation result available: {} for {}",
                        investigation, patient.demographics.name
                    )
                    .into(),
                );
                self.scheduler.schedule(
                    ScheduledEvent::new(
                        context.derive_id("evt"),
                        resulted,
                        EventKind::InvestigationResult,
                        patient.id.clone(),
                    )
                    .with_payload(payload),
                );
            }
            ActionType::Escalate => {
                let due = now + Duration::minutes(i64::from(config.escalation_response_minutes));
                let mut payload = Payload::new();
                payload.insert(
                    "escalated_at".into(),
                    now.format("%Y-%m-%dT%H:%M:%S").to_string().into(),
                );
                if let Some(reason) = action.details.get("reason") {
                    payload.insert("reason".into(), reason.clone());
                }
                self.scheduler.schedule(
                    ScheduledEvent::new(
                        context.derive_id("evt"),
                        due,
                        EventKind::EscalationResponse,
                        patient.id.clone(),
                    )
                    .with_payload(payload),
                );
            }
            ActionType::AskNurseQuestion => {}
        }
    }

    /// Point-in-time view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            scenario_id: self.scenario_id.clone(),
            status: self.status,
            clock: self.clock.snapshot(),
            scheduler: self.scheduler.snapshot(),
            patients: self
                .patients
                .values()
                .map(|p| PatientSnapshot {
                    patient_id: p.id.clone(),
                    name: p.demographics.name.clone(),
                    mrn: p.demographics.mrn.clone(),
                    ward: p.demographics.ward.clone(),
                    bed: p.demographics.bed.clone(),
                    current_state: p.current_state(),
                    actions_taken: p.actions_taken().len(),
                    state_changes: p.state_history().len(),
                })
                .collect(),
            action_count: self.action_count,
            notification_count: self.notifications.len(),
            pending_events: self.scheduler.len(),
            is_complete: self.is_complete(),
        }
    }

    /// The trainee's current view of one patient's chart.
    pub fn ehr_view(&self, patient_id: &str) -> Result<PatientRecordView, SimError> {
        let patient = self.require_patient(patient_id)?;
        Ok(PatientRecordView::build(patient, self.clock.now()))
    }

    pub fn visibility_summary(&self, patient_id: &str) -> Result<VisibilitySummary, SimError> {
        let patient = self.require_patient(patient_id)?;
        Ok(VisibilitySummary::compute(patient, self.clock.now()))
    }

    /// Debrief of the session so far.
    pub fn summary(&self) -> SessionSummary {
        let clock = self.clock.snapshot();
        SessionSummary {
            session_id: self.id,
            scenario_id: self.scenario_id.clone(),
            status: self.status,
            scenario_start_time: clock.scenario_start_time,
            final_time: clock.current_time,
            total_time_elapsed_minutes: clock.elapsed_minutes,
            total_actions: self.action_count,
            patients: self
                .patients
                .values()
                .map(|p| PatientOutcome {
                    patient_id: p.id.clone(),
                    name: p.demographics.name.clone(),
                    initial_state: self
                        .initial_states
                        .get(&p.id)
                        .copied()
                        .unwrap_or(p.current_state()),
                    final_state: p.current_state(),
                    state_changes: p.state_history().len(),
                    actions_taken: p.actions_taken().len(),
                    state_history: p.state_history().to_vec(),
                })
                .collect(),
            notifications: self.notifications.clone(),
            timeline: self.timeline.clone(),
        }
    }

    /// Ends the session. Further actions are rejected.
    pub fn complete(&mut self) -> Result<SessionSummary, SimError> {
        self.ensure_active()?;
        self.status = SessionStatus::Complete;

        let summary = self.summary();
        info!(
            "Session {} complete: {} actions over {} simulated minutes",
            self.id, summary.total_actions, summary.total_time_elapsed_minutes
        );
        Ok(summary)
    }
}

/// Files a delivered investigation result into the record unless the
/// requesting action already did.
fn deliver_result(patient: &mut Patient, event: &ScheduledEvent, context: &dyn SimulationContext) {
    if event
        .payload_str("result_id")
        .is_some_and(|id| patient.record().has_result(id))
    {
        return;
    }

    let Some(investigation) = event.payload_str("investigation_type") else {
        return;
    };

    let template = match event.payload.get("result_data") {
        Some(Value::Object(data)) => InvestigationTemplate {
            result_data: data.clone(),
            interpretation: event.payload_str("interpretation").map(str::to_string),
            abnormal_flags: event
                .payload
                .get("abnormal_flags")
                .and_then(Value::as_array)
                .map(|flags| {
                    flags
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        },
        _ => patient
            .trajectory()
            .investigation_template(patient.current_state(), investigation)
            .cloned()
            .unwrap_or_else(|| InvestigationTemplate::normal(investigation)),
    };

    let result_id = event
        .payload_str("result_id")
        .map(str::to_string)
        .unwrap_or_else(|| context.derive_id("result"));

    patient.record_mut().add_result(InvestigationResult {
        result_id,
        investigation_type: investigation.to_string(),
        requested_time: event.due_time,
        resulted_time: Some(event.due_time),
        result_data: template.result_data,
        interpretation: template.interpretation,
        abnormal_flags: template.abnormal_flags,
        visibility_rule: VisibilityRule::TimeElapsed {
            visible_after_time: event.due_time,
        },
    });
}
