//! Site Registry
//!
//! Loads the table of managed sites from a whitespace-delimited text file:
//!
//! ```text
//! # comment lines start with '#'
//! siteName  save  wwwSubdir  host       dbName  dbUser  dbPassWord  comment
//! blog      1     blog       localhost  blogdb  blog    s3cret      main blog
//! wiki      0     wiki       localhost  none    none    none        static
//! ```
//!
//! The first non-comment line is the header; it must name every column of
//! the fixed schema exactly once, in any order. Each row must have at least
//! as many fields as there are columns. When `comment` is the last column,
//! the rest of the line is taken as the comment. Site names are unique.
//! Only a `save` flag of exactly `1` marks a site for save-all; any other
//! value leaves it unsaved.
//!
//! The registry is reloaded on every invocation and never written.

mod errors;
mod site;

pub use errors::{RegistryError, RegistryResult};
pub use site::{Site, COLUMNS, CREDENTIAL_COLUMNS, NONE};

#[cfg(test)]
pub(crate) use site::test_site;

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use crate::observability::{log_event_with_fields, Event};

/// Validated header: column name to field position
struct Header {
    positions: HashMap<&'static str, usize>,
    comment_last: bool,
}

impl Header {
    fn parse(fields: &[&str]) -> RegistryResult<Self> {
        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for field in fields {
            if !seen.insert(*field) {
                duplicates.insert(field.to_string());
            }
        }
        if !duplicates.is_empty() {
            return Err(RegistryError::DuplicateColumns(duplicates.into_iter().collect()));
        }

        let missing: Vec<String> = COLUMNS
            .iter()
            .filter(|c| !seen.contains(*c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RegistryError::MissingColumns(missing));
        }

        let unknown: Vec<String> = fields
            .iter()
            .filter(|f| !COLUMNS.contains(f))
            .map(|f| f.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(RegistryError::UnknownColumns(unknown));
        }

        let positions: HashMap<&'static str, usize> = COLUMNS
            .iter()
            .map(|c| {
                let pos = fields.iter().position(|f| f == c).unwrap_or_default();
                (*c, pos)
            })
            .collect();
        let comment_last = positions["comment"] == COLUMNS.len() - 1;

        Ok(Self {
            positions,
            comment_last,
        })
    }

    fn field<'f>(&self, fields: &[&'f str], column: &str) -> &'f str {
        fields[self.positions[column]]
    }

    fn decode(&self, line: usize, fields: &[&str]) -> RegistryResult<Site> {
        if fields.len() < COLUMNS.len() {
            return Err(RegistryError::TooFewFields {
                line,
                expected: COLUMNS.len(),
                found: fields.len(),
            });
        }

        let flag = self.field(fields, "save");
        if flag != "1" && flag != "0" {
            let line = line.to_string();
            log_event_with_fields(
                Event::SaveFlagUnrecognised,
                &[
                    ("line", &line),
                    ("site", self.field(fields, "siteName")),
                    ("save", flag),
                ],
            );
        }
        let save = flag == "1";

        let comment = if self.comment_last {
            fields[COLUMNS.len() - 1..].join(" ")
        } else {
            self.field(fields, "comment").to_string()
        };

        Ok(Site {
            name: self.field(fields, "siteName").to_string(),
            save,
            www_subdir: self.field(fields, "wwwSubdir").to_string(),
            db_host: self.field(fields, "host").to_string(),
            db_name: self.field(fields, "dbName").to_string(),
            db_user: self.field(fields, "dbUser").to_string(),
            db_password: self.field(fields, "dbPassWord").to_string(),
            comment,
        })
    }
}

/// The loaded site table
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<Site>,
    by_name: HashMap<String, usize>,
}

impl SiteRegistry {
    /// Load and validate a site table file
    pub fn load(path: &Path) -> RegistryResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate site table text
    pub fn parse(content: &str) -> RegistryResult<Self> {
        let mut header: Option<Header> = None;
        let mut sites = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let fields: Vec<&str> = raw.split_whitespace().collect();
            if fields.is_empty() || fields[0].starts_with('#') {
                continue;
            }
            match &header {
                None => header = Some(Header::parse(&fields)?),
                Some(h) => sites.push(h.decode(idx + 1, &fields)?),
            }
        }

        if header.is_none() {
            return Err(RegistryError::MissingHeader);
        }
        if sites.is_empty() {
            return Err(RegistryError::NoSites);
        }

        let mut by_name = HashMap::with_capacity(sites.len());
        let mut duplicates = BTreeSet::new();
        for (row, site) in sites.iter().enumerate() {
            if by_name.insert(site.name.clone(), row).is_some() {
                duplicates.insert(site.name.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(RegistryError::DuplicateSites(duplicates.into_iter().collect()));
        }

        Ok(Self { sites, by_name })
    }

    /// Number of sites
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Always false for a loaded registry
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Look up a site by name
    pub fn get(&self, name: &str) -> RegistryResult<&Site> {
        self.by_name
            .get(name)
            .map(|row| &self.sites[*row])
            .ok_or_else(|| RegistryError::UnknownSite(name.to_string()))
    }

    /// Look up a site by zero-based row index
    pub fn row(&self, row: usize) -> RegistryResult<&Site> {
        self.sites.get(row).ok_or(RegistryError::RowOutOfRange {
            row,
            len: self.sites.len(),
        })
    }

    /// Sites in table order
    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.sites.iter()
    }

    /// Render the table with row numbers, aligned columns
    pub fn render_table(&self, hidden: &[&str]) -> String {
        let columns: Vec<&str> = COLUMNS.iter().copied().filter(|c| !hidden.contains(c)).collect();
        let widths: Vec<usize> = columns
            .iter()
            .map(|c| {
                self.sites
                    .iter()
                    .filter_map(|s| s.column(c))
                    .map(str::len)
                    .chain(std::iter::once(c.len()))
                    .max()
                    .unwrap_or_default()
            })
            .collect();

        let mut out = String::from("    ");
        for (column, width) in columns.iter().zip(&widths) {
            out.push_str(&format!("{:<width$}  ", column, width = *width));
        }
        out = out.trim_end().to_string();
        out.push('\n');

        for (row, site) in self.sites.iter().enumerate() {
            let mut line = format!("{:2}  ", row);
            for (column, width) in columns.iter().zip(&widths) {
                let value = site.column(column).unwrap_or_default();
                line.push_str(&format!("{:<width$}  ", value, width = *width));
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}
