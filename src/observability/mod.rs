//! Observability for sitekeep
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//! - Begin/complete scopes with elapsed time
//!
//! # Usage
//!
//! ```ignore
//! use sitekeep::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! let scope = ObservationScope::with_fields("BACKUP", &[("site", "s1")]);
//! log_event_with_fields(Event::ArchivePromoted, &[("to", "s1.m03.tar.gz")]);
//! scope.complete();
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::{ObservationScope, Timer};

fn severity_of(event: Event) -> Severity {
    if event.is_fatal() {
        Severity::Fatal
    } else if event.is_warning() {
        Severity::Warn
    } else if event == Event::CommandIssued {
        Severity::Trace
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(severity_of(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_of(event), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_of_events() {
        assert_eq!(severity_of(Event::RestoreInconsistent), Severity::Fatal);
        assert_eq!(severity_of(Event::SiteSkipped), Severity::Warn);
        assert_eq!(severity_of(Event::CommandIssued), Severity::Trace);
        assert_eq!(severity_of(Event::ArchiveWritten), Severity::Info);
    }

    #[test]
    fn test_log_event() {
        log_event(Event::SettingsLoaded);
        log_event(Event::SitesLoaded);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ArchivePromoted, &[("from", "s1.wd2.tar.gz")]);
    }
}
