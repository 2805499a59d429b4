//! In-memory controller with copy-on-write snapshots.
//!
//! Mutations run against a private draft cloned from the published state; the
//! draft replaces the published state only when the closure succeeds. Readers
//! hold an `Arc` to whichever state was published when they asked.
//!
//! Drafts share structure with the published state, so a mutation costs the
//! keys it touches rather than the size of the store.

use crate::model::question::{Question, QuestionId, VoteTally};
use crate::repo::memory_repo::MemoryQuestionRepository;
use crate::repo::question_repo::{QuestionReader, QuestionRepository, RepoResult};
use crate::store::{PersistenceController, StoreError, StoreResult};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Volatile question store. Committed means published, not durable.
#[derive(Debug, Default)]
pub struct MemoryController {
    write_lock: Mutex<()>,
    published: RwLock<Arc<MemoryQuestionRepository>>,
    closed: AtomicBool,
}

impl MemoryController {
    pub fn new() -> Self {
        info!("event=store_open module=store status=ok backend=memory");
        Self::default()
    }

    fn current(&self) -> StoreResult<Arc<MemoryQuestionRepository>> {
        let published = self
            .published
            .read()
            .map_err(|_| StoreError::Poisoned("snapshot"))?;
        Ok(Arc::clone(&published))
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl PersistenceController for MemoryController {
    type Snapshot<'a> = MemorySnapshot;

    fn execute_and_query<T, F>(&self, mutation: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn QuestionRepository) -> RepoResult<T>,
    {
        let _writer = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Poisoned("writer"))?;
        self.ensure_open()?;

        let mut draft = (*self.current()?).clone();
        let result = mutation(&mut draft)?;

        let mut published = self
            .published
            .write()
            .map_err(|_| StoreError::Poisoned("snapshot"))?;
        *published = Arc::new(draft);
        debug!("event=store_execute module=store status=ok backend=memory");
        Ok(result)
    }

    fn read_only(&self) -> StoreResult<Self::Snapshot<'_>> {
        self.ensure_open()?;
        Ok(MemorySnapshot(self.current()?))
    }

    fn close(&self) -> StoreResult<()> {
        let _writer = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Poisoned("writer"))?;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("event=store_close module=store status=ok backend=memory");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Frozen view of the memory store at the time it was taken.
#[derive(Debug, Clone)]
pub struct MemorySnapshot(Arc<MemoryQuestionRepository>);

impl QuestionReader for MemorySnapshot {
    fn read(&self, question_id: QuestionId) -> RepoResult<Option<Question>> {
        self.0.read(question_id)
    }

    fn read_all(&self) -> RepoResult<Vec<Question>> {
        self.0.read_all()
    }

    fn read_latest(&self) -> RepoResult<Option<Question>> {
        self.0.read_latest()
    }

    fn tally(&self, question_id: QuestionId) -> RepoResult<Option<VoteTally>> {
        self.0.tally(question_id)
    }

    fn count(&self) -> RepoResult<usize> {
        self.0.count()
    }
}
