//! Bulk save-all
//!
//! Runs a recurring dump for every site of the registry whose save flag is
//! set, in table order, one at a time. A failing site does not stop the
//! batch; every outcome is collected into a `BatchReport`.

use super::errors::BackupError;
use super::{BackupEngine, BackupOutcome, BackupRequest};
use crate::observability::{log_event_with_fields, Event};
use crate::registry::SiteRegistry;

/// Per-site outcomes of one save-all run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub saved: Vec<(String, BackupOutcome)>,
    /// Sites whose save flag is off
    pub skipped: Vec<String>,
    pub failed: Vec<(String, BackupError)>,
}

impl BatchReport {
    /// True when no site failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// One line per site
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (site, outcome) in &self.saved {
            out.push_str(&format!("saved    {} -> {}\n", site, outcome.archive_path.display()));
        }
        for site in &self.skipped {
            out.push_str(&format!("skipped  {}\n", site));
        }
        for (site, err) in &self.failed {
            out.push_str(&format!("FAILED   {}: {}\n", site, err));
        }
        out
    }
}

/// Recurring dump of every site with its save flag set
pub fn save_all(engine: &BackupEngine<'_>, registry: &SiteRegistry) -> BatchReport {
    let mut report = BatchReport::default();

    for site in registry.iter() {
        if !site.save {
            log_event_with_fields(
                Event::SiteSkipped,
                &[("site", &site.name), ("reason", "save flag off")],
            );
            report.skipped.push(site.name.clone());
            continue;
        }
        match engine.backup(&BackupRequest::dump(site)) {
            Ok(outcome) => report.saved.push((site.name.clone(), outcome)),
            Err(e) => report.failed.push((site.name.clone(), e)),
        }
    }

    let saved = report.saved.len().to_string();
    let skipped = report.skipped.len().to_string();
    let failed = report.failed.len().to_string();
    log_event_with_fields(
        Event::BatchFinished,
        &[("saved", &saved), ("skipped", &skipped), ("failed", &failed)],
    );
    report
}
