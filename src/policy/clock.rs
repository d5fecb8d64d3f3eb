//! Wall-clock port

use chrono::{Local, NaiveDateTime};

/// Source of local time for tagging and promotion
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// System local time
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Frozen time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
