//! Registry of live sessions.
//!
//! The kernel's `Session` is a plain value; whoever serves trainees owns the
//! registry. Methods take `&mut self`, so requests against one session are
//! serialized by the borrow checker.

use crate::error::HarnessError;
use chrono::NaiveDateTime;
use oncall_core::{ScenarioDefinition, Session, SessionConfig, SessionSummary, SimError};
use oncall_env::{SessionId, SimulationContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Store limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Active (not yet completed) sessions allowed at once
    pub max_active_sessions: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_active_sessions: 100,
        }
    }
}

/// One line of `SessionStore::list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionListing {
    pub session_id: SessionId,
    pub scenario_id: String,
    pub is_complete: bool,
    pub elapsed_minutes: i64,
    pub patient_count: usize,
    pub action_count: u64,
}

/// Owns every session created through it, keyed by id.
#[derive(Debug, Default)]
pub struct SessionStore {
    config: StoreConfig,
    sessions: BTreeMap<SessionId, Session>,
}

impl SessionStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            sessions: BTreeMap::new(),
        }
    }

    /// Builds a session from `scenario` and stores it.
    ///
    /// # Errors
    ///
    /// `StoreFull` when the active-session limit is reached, otherwise
    /// whatever `Session::from_scenario` rejects.
    pub fn create(
        &mut self,
        scenario: &ScenarioDefinition,
        config: SessionConfig,
        context: Arc<dyn SimulationContext>,
        start_override: Option<NaiveDateTime>,
    ) -> Result<SessionId, HarnessError> {
        let active = self.active_count();
        if active >= self.config.max_active_sessions {
            return Err(HarnessError::StoreFull(active));
        }

        let session = Session::from_scenario(scenario, config, context, start_override)?;
        let id = session.id();
        self.sessions.insert(id, session);
        debug!("Store holds {} sessions ({} active)", self.sessions.len(), active + 1);
        Ok(id)
    }

    pub fn get(&self, id: SessionId) -> Result<&Session, HarnessError> {
        self.sessions.get(&id).ok_or_else(|| missing(id))
    }

    pub fn get_mut(&mut self, id: SessionId) -> Result<&mut Session, HarnessError> {
        self.sessions.get_mut(&id).ok_or_else(|| missing(id))
    }

    /// Completes a session, keeping it for later inspection.
    pub fn complete(&mut self, id: SessionId) -> Result<SessionSummary, HarnessError> {
        Ok(self.get_mut(id)?.complete()?)
    }

    /// Drops a session. Returns false if it was not stored.
    pub fn remove(&mut self, id: SessionId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            info!("Session {} removed from store", id);
        }
        removed
    }

    pub fn list(&self) -> Vec<SessionListing> {
        self.sessions
            .values()
            .map(|s| SessionListing {
                session_id: s.id(),
                scenario_id: s.scenario_id().to_string(),
                is_complete: s.is_complete(),
                elapsed_minutes: s.clock().elapsed_minutes(),
                patient_count: s.patients().count(),
                action_count: s.action_count(),
            })
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.values().filter(|s| !s.is_complete()).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn missing(id: SessionId) -> HarnessError {
    SimError::not_found(format!("session {}", id)).into()
}
