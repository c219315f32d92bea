//! Simulation context implementing SimulationContext for deterministic runs.

use chrono::{DateTime, Duration, TimeZone, Utc};
use oncall_env::{SessionId, SimulationContext};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, LockResult, Mutex, MutexGuard, PoisonError};

/// Simulation context backed by a virtual wall clock and a seeded RNG.
///
/// This implements `SimulationContext` using:
/// - A virtual wall clock that only moves when `advance_time` is called
/// - A seeded ChaCha8 RNG for deterministic ids
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Virtual wall-clock time
    wall: Arc<Mutex<DateTime<Utc>>>,

    /// Deterministic RNG for ids
    rng: Arc<Mutex<ChaCha8Rng>>,
}

/// 2024-01-01 00:00:00 UTC
fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn recover<'a, T>(guard: LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    guard.unwrap_or_else(PoisonError::into_inner)
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            wall: Arc::new(Mutex::new(epoch())),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual wall time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut wall = recover(self.wall.lock());
        *wall += duration;
    }

    /// Advances virtual wall time by whole minutes.
    pub fn advance_minutes(&self, minutes: i64) {
        self.advance_time(Duration::minutes(minutes));
    }

    /// Sets the virtual wall time to a specific instant.
    pub fn set_time(&self, time: DateTime<Utc>) {
        let mut wall = recover(self.wall.lock());
        *wall = time;
    }

    fn next_u64(&self) -> u64 {
        recover(self.rng.lock()).gen()
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            wall: Arc::clone(&self.wall),
            rng: Arc::clone(&self.rng),
        }
    }
}

impl SimulationContext for SimContext {
    fn wall_time(&self) -> DateTime<Utc> {
        *recover(self.wall.lock())
    }

    fn derive_id(&self, prefix: &str) -> String {
        format!("{}_{:08x}", prefix, self.next_u64() as u32)
    }

    fn session_id(&self) -> SessionId {
        SessionId::from_seed(self.next_u64())
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
