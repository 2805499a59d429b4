//! Persistence controllers: serialized mutation plus snapshot reads.
//!
//! # Responsibility
//! - Run repository mutations one at a time, atomically and durably.
//! - Hand out read-only snapshots that never observe uncommitted writes.
//! - Release backend resources once on orderly shutdown.
//!
//! # Invariants
//! - At most one mutation closure runs at a time per controller.
//! - A failed mutation closure leaves no visible change.
//! - After `close`, every call fails with `StoreError::Closed`.

use crate::db::DbError;
use crate::repo::question_repo::{QuestionReader, QuestionRepository, RepoError, RepoResult};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryController, MemorySnapshot};
pub use sqlite::{SqliteController, SqliteSnapshot};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure raised by a persistence controller.
#[derive(Debug)]
pub enum StoreError {
    /// Mutation or read rejected by the repository.
    Repo(RepoError),
    /// Backend bootstrap or transaction failure.
    Db(DbError),
    /// Controller has been closed.
    Closed,
    /// A lock was poisoned by a panicking holder.
    Poisoned(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Closed => write!(f, "question store is closed"),
            Self::Poisoned(lock) => write!(f, "question store {lock} lock poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Closed | Self::Poisoned(_) => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ConnectionClosed => Self::Closed,
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Controller contract shared by all question store backends.
pub trait PersistenceController: Send + Sync {
    /// Read-only point-in-time view.
    type Snapshot<'a>: QuestionReader
    where
        Self: 'a;

    /// Applies `mutation` under the single-writer lock and returns its result
    /// once the change is committed.
    fn execute_and_query<T, F>(&self, mutation: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn QuestionRepository) -> RepoResult<T>;

    /// Same guarantees as `execute_and_query`, without a result.
    fn execute<F>(&self, mutation: F) -> StoreResult<()>
    where
        F: FnOnce(&mut dyn QuestionRepository) -> RepoResult<()>,
    {
        self.execute_and_query(mutation)
    }

    /// Opens a snapshot of the latest committed state.
    fn read_only(&self) -> StoreResult<Self::Snapshot<'_>>;

    /// Releases backend resources. Repeated calls are no-ops.
    fn close(&self) -> StoreResult<()>;

    fn is_closed(&self) -> bool;
}
