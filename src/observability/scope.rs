//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed
//! - Warns `{name}_INCOMPLETE` when dropped without being closed

use std::cell::Cell;
use std::time::Instant;

use super::logger::Logger;

/// A scope that logs the start and end of one engine operation
///
/// ```ignore
/// let scope = ObservationScope::with_fields("BACKUP", &[("site", "s1")]);
/// // ... do work ...
/// scope.complete_with_fields(&[("archive", "s1.wd2.tar.gz")]);
/// ```
///
/// Every closing line carries the fields given at creation plus
/// `elapsed_ms` since the scope opened.
pub struct ObservationScope<'a> {
    name: &'a str,
    completed: Cell<bool>,
    fields: Vec<(&'a str, String)>,
    timer: Timer,
}

impl<'a> ObservationScope<'a> {
    /// Create a new observation scope and log `{name}_BEGIN`
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Create a new observation scope with fields repeated on every line
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        let event = format!("{}_BEGIN", name);
        Logger::info(&event, fields);

        Self {
            name,
            completed: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            timer: Timer::new(),
        }
    }

    fn closing_fields<'b>(&'b self, extra: &[(&'b str, &'b str)], elapsed: &'b str) -> Vec<(&'b str, &'b str)> {
        let mut all: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all.extend(extra.iter().copied());
        all.push(("elapsed_ms", elapsed));
        all
    }

    /// Mark the scope as successfully completed
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Mark the scope as successfully completed with additional fields
    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        self.completed.set(true);
        let event = format!("{}_COMPLETE", self.name);
        let elapsed = self.timer.elapsed_ms();
        Logger::info(&event, &self.closing_fields(extra_fields, &elapsed));
    }

    /// Mark the scope as failed with a reason
    pub fn fail(self, reason: &str) {
        self.completed.set(true);
        let event = format!("{}_FAILED", self.name);
        let elapsed = self.timer.elapsed_ms();
        Logger::error(&event, &self.closing_fields(&[("reason", reason)], &elapsed));
    }

    /// Close the scope without success or failure, e.g. an operator declined
    pub fn abandon(self, reason: &str) {
        self.completed.set(true);
        let event = format!("{}_ABANDONED", self.name);
        let elapsed = self.timer.elapsed_ms();
        Logger::warn(&event, &self.closing_fields(&[("reason", reason)], &elapsed));
    }

    /// Check if the scope has been closed
    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            let event = format!("{}_INCOMPLETE", self.name);
            Logger::warn(&event, &[("reason", "scope dropped without completion")]);
        }
    }
}

/// Elapsed-time tracker with an interim lap, used for per-step timings
pub struct Timer {
    start: Instant,
    lap: Cell<Instant>,
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            lap: Cell::new(now),
        }
    }

    /// Milliseconds since creation
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }

    /// Milliseconds since the previous lap (or creation); starts a new lap
    pub fn lap_ms(&self) -> String {
        let now = Instant::now();
        let ms = now.duration_since(self.lap.get()).as_millis();
        self.lap.set(now);
        ms.to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
