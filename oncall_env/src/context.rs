//! Core environment context trait for the on-call simulator.

use crate::SessionId;
use chrono::{DateTime, Utc};

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the simulation kernel can run
/// against the system clock in production and against a frozen, manually
/// advanced clock in tests and scripted runs.
///
/// # Implementations
///
/// - **Production**: `SystemContext` - wraps `Utc::now()` and UUID v4 ids
/// - **Simulation**: `SimContext` - virtual wall clock + `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// Every source of non-determinism the kernel touches (the wall-clock read and
/// the entropy behind generated ids) is routed through this trait.
pub trait SimulationContext: Send + Sync + 'static {
    /// Returns the current wall-clock instant.
    ///
    /// The session clock measures real elapsed time as the difference between
    /// two reads of this value. In simulation, this is the virtual wall clock.
    fn wall_time(&self) -> DateTime<Utc>;

    /// Generates a short identifier such as `note_3fa9c1d2`.
    ///
    /// Used for notes, results and events created during a session.
    /// The simulation implementation derives ids from the master seed so that
    /// two runs with the same seed produce byte-identical timelines.
    fn derive_id(&self, prefix: &str) -> String;

    /// Allocates an identifier for a new session.
    ///
    /// In production: random UUID v4
    /// In simulation: drawn from the seeded generator
    fn session_id(&self) -> SessionId;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
