//! Observable events for sitekeep
//!
//! Events are explicit and typed. Scope-based begin/complete lines are
//! produced by `ObservationScope`; the events here mark single points inside
//! an operation.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Settings file loaded and validated
    SettingsLoaded,
    /// Site table loaded and validated
    SitesLoaded,
    /// Save flag other than 0 or 1; the site is not saved
    SaveFlagUnrecognised,

    // Backup
    /// Archive tag computed
    TagSelected,
    /// Existing daily archive renamed to a longterm slot
    ArchivePromoted,
    /// Database dump written
    DatabaseDumped,
    /// Compressed archive written under its final name
    ArchiveWritten,
    /// Archive transferred to the remote location
    ArchiveUploaded,
    /// Site skipped during save-all because its save flag is off
    SiteSkipped,
    /// Save-all finished, possibly with failures
    BatchFinished,

    // Restore
    /// Archive extracted into the work directory
    ArchiveExtracted,
    /// Extracted tree has the expected layout
    ArchiveValidated,
    /// Database and user verified or provisioned
    DatabaseEnsured,
    /// Operator was asked to confirm a destructive step
    ConfirmationRequested,
    /// Operator declined a destructive step
    ConfirmationDeclined,
    /// Database content replaced from the dump
    DatabaseRestored,
    /// Live web directory replaced by the extracted tree
    FilesSwapped,
    /// Restore stopped after live data was changed (FATAL)
    RestoreInconsistent,

    // Shared
    /// External command issued
    CommandIssued,
    /// Step skipped because the runner simulates
    StepSimulated,
    /// Action log entry appended
    ActionLogged,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SettingsLoaded => "SETTINGS_LOADED",
            Event::SitesLoaded => "SITES_LOADED",
            Event::SaveFlagUnrecognised => "SAVE_FLAG_UNRECOGNISED",

            Event::TagSelected => "TAG_SELECTED",
            Event::ArchivePromoted => "ARCHIVE_PROMOTED",
            Event::DatabaseDumped => "DATABASE_DUMPED",
            Event::ArchiveWritten => "ARCHIVE_WRITTEN",
            Event::ArchiveUploaded => "ARCHIVE_UPLOADED",
            Event::SiteSkipped => "SITE_SKIPPED",
            Event::BatchFinished => "SAVEALL_FINISHED",

            Event::ArchiveExtracted => "ARCHIVE_EXTRACTED",
            Event::ArchiveValidated => "ARCHIVE_VALIDATED",
            Event::DatabaseEnsured => "DATABASE_ENSURED",
            Event::ConfirmationRequested => "CONFIRMATION_REQUESTED",
            Event::ConfirmationDeclined => "CONFIRMATION_DECLINED",
            Event::DatabaseRestored => "DATABASE_RESTORED",
            Event::FilesSwapped => "FILES_SWAPPED",
            Event::RestoreInconsistent => "RESTORE_INCONSISTENT",

            Event::CommandIssued => "COMMAND_ISSUED",
            Event::StepSimulated => "STEP_SIMULATED",
            Event::ActionLogged => "ACTION_LOGGED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::RestoreInconsistent)
    }

    /// Returns true if the event reports something the operator must look at
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::SaveFlagUnrecognised | Event::SiteSkipped | Event::ConfirmationDeclined
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
