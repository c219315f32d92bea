//! Production implementation of SimulationContext backed by the system clock.

use crate::{SessionId, SimulationContext};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Production context backed by the OS clock and random UUIDs.
///
/// Time comes from the system clock, ids from UUID v4.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemContext;

impl SystemContext {
    /// Creates a new SystemContext.
    pub fn new() -> Self {
        Self
    }

    /// Creates an Arc-wrapped context for sharing across sessions.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl SimulationContext for SystemContext {
    fn wall_time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn derive_id(&self, prefix: &str) -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("{}_{}", prefix, &hex[..8])
    }

    fn session_id(&self) -> SessionId {
        SessionId::new()
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}
