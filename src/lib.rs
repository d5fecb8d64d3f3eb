//! sitekeep - backup and recovery of websites with a database
//!
//! Each backup is one gzip tar archive holding the web directory and a
//! SQL dump. Recurring dumps rotate through weekday slots; some are
//! promoted to monthly and weekly longterm slots.

pub mod actionlog;
pub mod backup;
pub mod cli;
pub mod confirm;
pub mod database;
pub mod observability;
pub mod policy;
pub mod registry;
pub mod restore;
pub mod runner;
pub mod settings;
