//! Tiered retention
//!
//! On four fixed days of the month the daily slot about to be overwritten
//! is kept instead, renamed to a longterm slot:
//!
//! | day | longterm tag |
//! |-----|--------------|
//! | 08  | `m<month>`   |
//! | 15  | `w1`         |
//! | 23  | `w2`         |
//! | 01  | `w3`         |
//!
//! There is no correction for short months. A site therefore keeps at most
//! 12 monthly and 3 weekly longterm archives; a promotion into an occupied
//! slot replaces the archive of the same calendar month or week slot.

use std::path::Path;

use chrono::NaiveDate;

use super::tag::ArchiveTag;

/// Longterm tag due on `date`, if any
pub fn promotion_tag(date: NaiveDate) -> Option<ArchiveTag> {
    let tag = match date.format("%d").to_string().as_str() {
        "08" => date.format("m%m").to_string(),
        "15" => "w1".to_string(),
        "23" => "w2".to_string(),
        "01" => "w3".to_string(),
        _ => return None,
    };
    Some(ArchiveTag(tag))
}

/// Decide whether the archive at `existing` must be kept under a longterm
/// tag before today's dump overwrites it. Only checks for existence.
pub fn promote(existing: &Path, today: NaiveDate) -> Option<ArchiveTag> {
    if !existing.is_file() {
        return None;
    }
    promotion_tag(today)
}
