//! Site record and the fixed site-table schema

use std::fmt;

/// Sentinel used in the site table for "no value"
pub const NONE: &str = "none";

/// Column names of the site table, in canonical order
pub const COLUMNS: [&str; 8] = [
    "siteName",
    "save",
    "wwwSubdir",
    "host",
    "dbName",
    "dbUser",
    "dbPassWord",
    "comment",
];

/// Columns hidden from the default table display
pub const CREDENTIAL_COLUMNS: [&str; 2] = ["dbUser", "dbPassWord"];

/// One managed website. Immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct Site {
    pub name: String,
    /// Participates in bulk save-all
    pub save: bool,
    /// Web directory relative to the configured web root
    pub www_subdir: String,
    pub db_host: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub comment: String,
}

impl Site {
    /// Whether the site carries a database to dump and restore
    pub fn has_database(&self) -> bool {
        self.db_name != NONE && self.db_user != NONE
    }

    /// File name of the SQL dump inside an archive's `database/` tree
    pub fn sql_file_name(&self) -> String {
        format!("{}.sql", self.name)
    }

    /// Value of a column by its header name
    pub fn column(&self, column: &str) -> Option<&str> {
        let value = match column {
            "siteName" => self.name.as_str(),
            "save" => {
                if self.save {
                    "1"
                } else {
                    "0"
                }
            }
            "wwwSubdir" => self.www_subdir.as_str(),
            "host" => self.db_host.as_str(),
            "dbName" => self.db_name.as_str(),
            "dbUser" => self.db_user.as_str(),
            "dbPassWord" => self.db_password.as_str(),
            "comment" => self.comment.as_str(),
            _ => return None,
        };
        Some(value)
    }
}

// Passwords stay out of debug output
impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("name", &self.name)
            .field("save", &self.save)
            .field("www_subdir", &self.www_subdir)
            .field("db_host", &self.db_host)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"***")
            .field("comment", &self.comment)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_site(name: &str) -> Site {
    Site {
        name: name.to_string(),
        save: true,
        www_subdir: name.to_string(),
        db_host: "localhost".to_string(),
        db_name: format!("{}_db", name),
        db_user: format!("{}_user", name),
        db_password: "secret".to_string(),
        comment: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_database() {
        let mut site = test_site("s1");
        assert!(site.has_database());

        site.db_name = NONE.to_string();
        assert!(!site.has_database());
    }

    #[test]
    fn test_every_column_resolves() {
        let site = test_site("s1");
        for column in COLUMNS {
            assert!(site.column(column).is_some(), "{}", column);
        }
        assert_eq!(site.column("save"), Some("1"));
        assert_eq!(site.column("nope"), None);
    }

    #[test]
    fn test_debug_hides_password() {
        let site = test_site("s1");
        let debug = format!("{:?}", site);
        assert!(!debug.contains("secret"));
    }
}
