//! Frozen environment used by the kernel's unit tests.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use oncall_env::{SessionId, SimulationContext};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Wall clock that only moves when told to, with sequential ids.
pub struct FrozenContext {
    wall: Mutex<DateTime<Utc>>,
    next_id: AtomicU64,
}

impl FrozenContext {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self {
            wall: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn advance_minutes(&self, minutes: i64) {
        let mut wall = self.wall.lock().unwrap();
        *wall += Duration::minutes(minutes);
    }

    pub fn advance_seconds(&self, seconds: i64) {
        let mut wall = self.wall.lock().unwrap();
        *wall += Duration::seconds(seconds);
    }
}

impl SimulationContext for FrozenContext {
    fn wall_time(&self) -> DateTime<Utc> {
        *self.wall.lock().unwrap()
    }

    fn derive_id(&self, prefix: &str) -> String {
        format!("{}_{:08}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn session_id(&self) -> SessionId {
        SessionId::from_seed(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn seed(&self) -> u64 {
        0
    }
}

/// 2024-01-15 at `hour:minute`, the date every test scenario runs on.
pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .unwrap()
}
