//! Question database: connection setup and schema evolution.
//!
//! Every SQLite connection the store touches comes from [`open_db`],
//! [`open_db_in_memory`] or [`open_read_connection`]. Writable connections
//! are returned only after [`schema::upgrade`] brought them to
//! [`schema::latest_version`]; read-only ones trust the writer to have done so.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub mod schema;

pub use open::{open_db, open_db_in_memory, open_read_connection};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening or upgrading the question database.
#[derive(Debug)]
pub enum DbError {
    /// SQLite rejected a statement, pragma or open call.
    Sqlite(rusqlite::Error),
    /// The file was last written by a build with a newer question schema.
    SchemaTooNew { found: u32, supported: u32 },
    /// A schema step left rows pointing at missing questions.
    BrokenReferences { version: u32, violations: usize },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "question database uses schema {found}, this build reads up to {supported}"
            ),
            Self::BrokenReferences {
                version,
                violations,
            } => write!(
                f,
                "schema step {version} left {violations} rows with dangling question references"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::SchemaTooNew { .. } | Self::BrokenReferences { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
