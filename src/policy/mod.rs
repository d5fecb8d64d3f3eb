//! Archive Tag Policy
//!
//! Pure decisions about archive naming:
//! - which tag a new archive gets (`tag_for`)
//! - whether an existing daily archive is kept as longterm (`promote`)
//! - which directory holds a tag's archives (`resolve_archive_dir`)
//!
//! Time comes from a `Clock` so that every decision is reproducible.

mod clock;
mod errors;
mod location;
mod retention;
mod tag;

pub use clock::{Clock, FixedClock, LocalClock};
pub use errors::{PolicyError, PolicyResult};
pub use location::{
    dated_label, ensure_dir, list_archives, modified_date, resolve_archive_dir, ArchiveEntry,
    ArchiveListing,
};
pub use retention::{promote, promotion_tag};
pub use tag::{tag_for, ArchiveTag, TagKind, ARCHIVE_SUFFIX};
