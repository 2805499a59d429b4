//! SQLite controller: one serialized writer, a pool of snapshot readers.
//!
//! # Invariants
//! - Every mutation runs inside one `IMMEDIATE` transaction on the writer
//!   connection and is committed before the call returns.
//! - A snapshot pins one reader connection inside a read transaction; WAL
//!   mode keeps it isolated from concurrent commits.
//! - Reader connections are opened read-only.
//! - Opening a snapshot never waits on a pooled reader. When every pooled
//!   reader is busy, the snapshot gets its own short-lived connection, so a
//!   thread may hold several snapshots at once.
//! - `close` releases the writer and every pooled reader, waiting for open
//!   snapshots on pooled readers to be dropped first. Overflow connections
//!   close with their snapshot.

use crate::db::{open_db, open_read_connection, DbResult};
use crate::model::question::{Question, QuestionId, VoteTally};
use crate::repo::question_repo::{
    count_questions, load_all_questions, load_latest_question, load_question, load_tally,
    QuestionReader, QuestionRepository, RepoError, RepoResult, SqliteQuestionRepository,
};
use crate::store::{PersistenceController, StoreError, StoreResult};
use log::{debug, error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Instant;

/// Default number of snapshot reader connections.
pub const DEFAULT_READ_CONNECTIONS: usize = 4;

/// Durable question store backed by one SQLite database file.
#[derive(Debug)]
pub struct SqliteController {
    path: PathBuf,
    writer: Mutex<Option<Connection>>,
    readers: Vec<Mutex<Option<Connection>>>,
    next_reader: AtomicUsize,
    closed: AtomicBool,
}

impl SqliteController {
    /// Opens (creating and migrating when needed) the database at `path`.
    ///
    /// `read_connections` is clamped to at least one.
    pub fn open(path: impl AsRef<Path>, read_connections: usize) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = open_db(&path)?;
        SqliteQuestionRepository::try_new(&writer)?;

        let readers = (0..read_connections.max(1))
            .map(|_| open_read_connection(&path).map(|conn| Mutex::new(Some(conn))))
            .collect::<DbResult<Vec<_>>>()?;

        info!(
            "event=store_open module=store status=ok backend=sqlite readers={}",
            readers.len()
        );
        Ok(Self {
            path,
            writer: Mutex::new(Some(writer)),
            readers,
            next_reader: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Database file backing this controller.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Picks an idle pooled reader, or opens an overflow reader when all of
    /// them are in use.
    fn acquire_reader(&self) -> StoreResult<ReaderHandle<'_>> {
        let start = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        for offset in 0..self.readers.len() {
            let index = (start + offset) % self.readers.len();
            match self.readers[index].try_lock() {
                Ok(slot) if slot.is_some() => return Ok(ReaderHandle::Pooled(slot)),
                Ok(_) => return Err(StoreError::Closed),
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(_)) => return Err(StoreError::Poisoned("reader")),
            }
        }

        debug!(
            "event=reader_overflow module=store status=ok backend=sqlite pooled={}",
            self.readers.len()
        );
        Ok(ReaderHandle::Overflow(open_read_connection(&self.path)?))
    }

    fn close_readers(&self) -> StoreResult<()> {
        for slot in &self.readers {
            let mut slot = slot.lock().map_err(|_| StoreError::Poisoned("reader"))?;
            let Some(conn) = slot.take() else {
                continue;
            };
            if let Err((_, err)) = conn.close() {
                warn!(
                    "event=store_close module=store status=warn backend=sqlite error_code=reader_close_failed error={}",
                    err
                );
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn open_reader_count(&self) -> usize {
        self.readers
            .iter()
            .filter(|slot| slot.lock().map(|slot| slot.is_some()).unwrap_or(false))
            .count()
    }
}

impl PersistenceController for SqliteController {
    type Snapshot<'a> = SqliteSnapshot<'a>;

    fn execute_and_query<T, F>(&self, mutation: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn QuestionRepository) -> RepoResult<T>,
    {
        let started_at = Instant::now();
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Poisoned("writer"))?;
        let conn = writer.as_mut().ok_or(StoreError::Closed)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = {
            let mut repo = SqliteQuestionRepository::assume_ready(&tx);
            mutation(&mut repo)
        };

        match result {
            Ok(value) => {
                tx.commit()?;
                debug!(
                    "event=store_execute module=store status=ok backend=sqlite duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                debug!(
                    "event=store_execute module=store status=rollback backend=sqlite duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Err(err.into())
            }
        }
    }

    fn read_only(&self) -> StoreResult<Self::Snapshot<'_>> {
        self.ensure_open()?;
        SqliteSnapshot::begin(self.acquire_reader()?)
    }

    fn close(&self) -> StoreResult<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Poisoned("writer"))?;
        self.closed.store(true, Ordering::Release);
        self.close_readers()?;

        let Some(conn) = writer.take() else {
            return Ok(());
        };

        if let Err(err) = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);") {
            warn!(
                "event=store_close module=store status=warn backend=sqlite error_code=checkpoint_failed error={}",
                err
            );
        }
        match conn.close() {
            Ok(()) => {
                info!("event=store_close module=store status=ok backend=sqlite");
                Ok(())
            }
            Err((_, err)) => {
                error!(
                    "event=store_close module=store status=error backend=sqlite error={}",
                    err
                );
                Err(err.into())
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Connection backing one snapshot.
enum ReaderHandle<'a> {
    Pooled(MutexGuard<'a, Option<Connection>>),
    Overflow(Connection),
}

impl ReaderHandle<'_> {
    fn conn(&self) -> RepoResult<&Connection> {
        match self {
            Self::Pooled(slot) => slot.as_ref().ok_or(RepoError::ConnectionClosed),
            Self::Overflow(conn) => Ok(conn),
        }
    }
}

/// Read transaction pinned on one reader connection.
///
/// The transaction ends when the snapshot is dropped.
pub struct SqliteSnapshot<'a> {
    reader: ReaderHandle<'a>,
}

impl<'a> SqliteSnapshot<'a> {
    fn begin(reader: ReaderHandle<'a>) -> StoreResult<Self> {
        let conn = reader.conn()?;
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK;")?;
        }
        conn.execute_batch("BEGIN DEFERRED;")?;
        // WAL read snapshots start at the first read, not at BEGIN.
        count_questions(conn)?;
        Ok(Self { reader })
    }
}

impl Drop for SqliteSnapshot<'_> {
    fn drop(&mut self) {
        let Ok(conn) = self.reader.conn() else {
            return;
        };
        if let Err(err) = conn.execute_batch("COMMIT;") {
            warn!(
                "event=snapshot_end module=store status=warn backend=sqlite error={}",
                err
            );
        }
    }
}

impl QuestionReader for SqliteSnapshot<'_> {
    fn read(&self, question_id: QuestionId) -> RepoResult<Option<Question>> {
        load_question(self.reader.conn()?, question_id)
    }

    fn read_all(&self) -> RepoResult<Vec<Question>> {
        load_all_questions(self.reader.conn()?)
    }

    fn read_latest(&self) -> RepoResult<Option<Question>> {
        load_latest_question(self.reader.conn()?)
    }

    fn tally(&self, question_id: QuestionId) -> RepoResult<Option<VoteTally>> {
        load_tally(self.reader.conn()?, question_id)
    }

    fn count(&self) -> RepoResult<usize> {
        count_questions(self.reader.conn()?)
    }
}
