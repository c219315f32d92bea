//! The hybrid session clock.
//!
//! Simulated time runs alongside real time and can be pushed forward
//! artificially:
//!
//! ```text
//! current_time = scenario_start + whole_minutes(wall_now - session_start) + artificial_minutes
//! ```
//!
//! The wall-clock read goes through [`SimulationContext`] so that tests and
//! scripted runs can freeze it.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use oncall_env::SimulationContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Hybrid clock: real elapsed time plus artificial penalties.
#[derive(Clone)]
pub struct SimulationClock {
    /// Scenario-local instant the shift starts at (e.g. 20:00)
    scenario_start: NaiveDateTime,

    /// Wall-clock instant the session was created
    session_start: DateTime<Utc>,

    /// Minutes added by in-person reviews; only ever grows
    artificial_minutes: u32,

    context: Arc<dyn SimulationContext>,
}

/// Serializable view of the clock at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub scenario_start_time: NaiveDateTime,
    pub current_time: NaiveDateTime,
    pub elapsed_minutes: i64,
    pub real_elapsed_minutes: i64,
    pub artificial_minutes_added: u32,
    /// `HH:MM`
    pub formatted_time: String,
    /// `"N mins"`
    pub formatted_elapsed: String,
}

impl SimulationClock {
    /// Creates a clock whose session starts at the context's current wall time.
    pub fn new(scenario_start: NaiveDateTime, context: Arc<dyn SimulationContext>) -> Self {
        let session_start = context.wall_time();
        Self::with_session_start(scenario_start, session_start, context)
    }

    /// Creates a clock with an explicit session start instant.
    pub fn with_session_start(
        scenario_start: NaiveDateTime,
        session_start: DateTime<Utc>,
        context: Arc<dyn SimulationContext>,
    ) -> Self {
        Self {
            scenario_start,
            session_start,
            artificial_minutes: 0,
            context,
        }
    }

    /// Current simulated instant.
    pub fn now(&self) -> NaiveDateTime {
        self.scenario_start + Duration::minutes(self.elapsed_minutes())
    }

    /// Whole minutes of real time since the session started.
    ///
    /// Clamped at zero if the wall clock reads earlier than the session start.
    pub fn real_elapsed_minutes(&self) -> i64 {
        (self.context.wall_time() - self.session_start)
            .num_minutes()
            .max(0)
    }

    /// Total simulated minutes since the scenario started (real + artificial).
    pub fn elapsed_minutes(&self) -> i64 {
        self.real_elapsed_minutes() + i64::from(self.artificial_minutes)
    }

    /// Minutes added so far by in-person reviews.
    pub fn artificial_minutes(&self) -> u32 {
        self.artificial_minutes
    }

    pub fn scenario_start(&self) -> NaiveDateTime {
        self.scenario_start
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    /// Pushes simulated time forward and returns the new `now()`.
    ///
    /// Only the in-person review action calls this; the session enforces it.
    pub fn add_artificial_time(&mut self, minutes: u32) -> NaiveDateTime {
        self.artificial_minutes = self.artificial_minutes.saturating_add(minutes);
        self.now()
    }

    /// Captures the clock state for display.
    pub fn snapshot(&self) -> ClockSnapshot {
        let real_elapsed = self.real_elapsed_minutes();
        let elapsed = real_elapsed + i64::from(self.artificial_minutes);
        let current_time = self.scenario_start + Duration::minutes(elapsed);

        ClockSnapshot {
            scenario_start_time: self.scenario_start,
            current_time,
            elapsed_minutes: elapsed,
            real_elapsed_minutes: real_elapsed,
            artificial_minutes_added: self.artificial_minutes,
            formatted_time: current_time.format("%H:%M").to_string(),
            formatted_elapsed: format!("{} mins", elapsed),
        }
    }
}

impl std::fmt::Debug for SimulationClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationClock")
            .field("scenario_start", &self.scenario_start)
            .field("session_start", &self.session_start)
            .field("artificial_minutes", &self.artificial_minutes)
            .finish_non_exhaustive()
    }
}
