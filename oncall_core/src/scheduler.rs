//! Time-ordered event scheduler.
//!
//! Events fire at simulated times, never real times. The heap is keyed by
//! `(due_time, seq)` where `seq` is a monotonic insertion counter, so events
//! that share a due time come back in the order they were scheduled.

use chrono::NaiveDateTime;
use oncall_env::PatientId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Free-form key/value document attached to events, findings and results.
///
/// The kernel passes these through; only a handful of documented keys are
/// ever read.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Kind of a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A laboratory or imaging result is back
    InvestigationResult,
    /// The patient gets worse at a fixed time
    PatientDeterioration,
    /// A nurse call or bleep about a patient
    NewRequest,
    /// A senior has responded to an escalation
    EscalationResponse,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::InvestigationResult => "investigation_result",
            EventKind::PatientDeterioration => "patient_deterioration",
            EventKind::NewRequest => "new_request",
            EventKind::EscalationResponse => "escalation_response",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "investigation_result" => Ok(EventKind::InvestigationResult),
            "patient_deterioration" => Ok(EventKind::PatientDeterioration),
            "new_request" => Ok(EventKind::NewRequest),
            "escalation_response" => Ok(EventKind::EscalationResponse),
            _ => Err(format!("Unknown event kind: {}", s)),
        }
    }
}

/// A future-dated occurrence. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: String,
    pub due_time: NaiveDateTime,
    pub kind: EventKind,
    pub patient_id: PatientId,
    #[serde(default)]
    pub payload: Payload,
}

impl ScheduledEvent {
    pub fn new(
        id: impl Into<String>,
        due_time: NaiveDateTime,
        kind: EventKind,
        patient_id: PatientId,
    ) -> Self {
        Self {
            id: id.into(),
            due_time,
            kind,
            patient_id,
            payload: Payload::new(),
        }
    }

    /// Attaches a payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Reads a string field from the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

/// Heap entry. Ordering is reversed so `BinaryHeap` pops the earliest first.
#[derive(Debug)]
struct Queued {
    seq: u64,
    event: ScheduledEvent,
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap behavior.
        // Tie-break on insertion sequence so equal due times stay FIFO.
        other
            .event
            .due_time
            .cmp(&self.event.due_time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Queued {}

/// Scheduler state for debugging/display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub pending_events: usize,
    pub delivered_events: u64,
    pub next_event_time: Option<NaiveDateTime>,
}

/// Priority queue of pending events.
#[derive(Debug, Default)]
pub struct EventScheduler {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
    delivered: u64,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an event. Events are never dropped or expired.
    pub fn schedule(&mut self, event: ScheduledEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued { seq, event });
    }

    /// Removes and returns the earliest event due at or before `as_of`.
    pub fn pop_due(&mut self, as_of: NaiveDateTime) -> Option<ScheduledEvent> {
        if !self
            .heap
            .peek()
            .is_some_and(|head| head.event.due_time <= as_of)
        {
            return None;
        }
        let queued = self.heap.pop()?;
        self.delivered += 1;
        Some(queued.event)
    }

    /// Removes and returns every event due at or before `as_of`, earliest
    /// first, FIFO among equal due times.
    pub fn drain_due(&mut self, as_of: NaiveDateTime) -> Vec<ScheduledEvent> {
        std::iter::from_fn(|| self.pop_due(as_of)).collect()
    }

    /// Pending events in the order they will be delivered.
    pub fn pending(&self) -> Vec<&ScheduledEvent> {
        let mut queued: Vec<&Queued> = self.heap.iter().collect();
        // `Queued` orders latest-first; reverse for delivery order.
        queued.sort_by(|a, b| b.cmp(a));
        queued.into_iter().map(|q| &q.event).collect()
    }

    /// Due time of the next event, if any.
    pub fn next_due_time(&self) -> Option<NaiveDateTime> {
        self.heap.peek().map(|q| q.event.due_time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of due events handed out so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            pending_events: self.len(),
            delivered_events: self.delivered,
            next_event_time: self.next_due_time(),
        }
    }
}
