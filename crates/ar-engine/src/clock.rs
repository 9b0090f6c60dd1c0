//! Engine clock

use chrono::{DateTime, Utc};

/// Source of "now" for a cycle
///
/// All timestamps stamped on committed mutations within one cycle come from
/// a single clock read at cycle start. Tests pin the clock to a fixed
/// instant for deterministic snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub enum RulesClock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl RulesClock {
    /// Pin the clock to a fixed instant
    pub fn fixed(instant: DateTime<Utc>) -> Self {
        RulesClock::Fixed(instant)
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            RulesClock::System => Utc::now(),
            RulesClock::Fixed(instant) => *instant,
        }
    }
}
