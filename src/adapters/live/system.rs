//! Live clock and ID generator backed by the operating system.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ports::clock::Clock;
use crate::ports::id_gen::IdGenerator;

/// Clock reading the system time.
pub struct LiveClock;

impl Clock for LiveClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Generates random v4 UUIDs for event ids.
#[derive(Default)]
pub struct LiveIdGenerator;

impl IdGenerator for LiveIdGenerator {
    fn generate_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
