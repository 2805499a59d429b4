//! Question use-case service.
//!
//! # Responsibility
//! - Stamp ownership on write paths and enforce owner-only update/delete.
//! - Route mutations through the controller and reads through snapshots.
//! - Close the controller once on shutdown.
//!
//! # Invariants
//! - Existence is checked before ownership, both before any mutation.
//! - The owner stored on create/update is always the calling user.
//! - Store failures are propagated unchanged, never retried.

use crate::model::question::{Answer, Question, QuestionId, VoteTally};
use crate::model::user::{User, UserId};
use crate::repo::question_repo::{QuestionReader, RepoError};
use crate::store::{PersistenceController, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};

pub type QuestionServiceResult<T> = Result<T, QuestionServiceError>;

/// Service error for question use-cases.
#[derive(Debug)]
pub enum QuestionServiceError {
    /// Target question does not exist. `None` when no id was supplied or the
    /// store is empty.
    NotFound(Option<QuestionId>),
    /// Caller is not the owner of the target question.
    Forbidden {
        question_id: QuestionId,
        user_id: UserId,
    },
    /// Persistence-layer failure.
    Store(StoreError),
}

impl QuestionServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }
}

impl Display for QuestionServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(Some(question_id)) => write!(f, "question not found: {question_id}"),
            Self::NotFound(None) => write!(f, "question not found"),
            Self::Forbidden {
                question_id,
                user_id,
            } => write!(
                f,
                "user {user_id} is not allowed to modify question {question_id}"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QuestionServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for QuestionServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Repo(RepoError::NotFound(question_id)) => Self::NotFound(Some(question_id)),
            other => Self::Store(other),
        }
    }
}

impl From<RepoError> for QuestionServiceError {
    fn from(value: RepoError) -> Self {
        StoreError::from(value).into()
    }
}

/// Store liveness report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub question_count: usize,
}

/// Question service facade over one persistence controller.
pub struct QuestionService<C: PersistenceController> {
    controller: C,
    shut_down: AtomicBool,
}

impl<C: PersistenceController> QuestionService<C> {
    /// Creates a service owning `controller`. Call `shutdown` once when the
    /// owning process stops.
    pub fn new(controller: C) -> Self {
        Self {
            controller,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Stores `question` owned by `user`, ignoring any owner in the payload.
    pub fn create(&self, user: &User, question: Question) -> QuestionServiceResult<Question> {
        let new_question = question.with_owner(user.user_id);
        let created = self
            .controller
            .execute_and_query(|repo| repo.create(&new_question))?;

        info!(
            "event=question_create module=service status=ok question_id={} user_id={}",
            created.question_id.unwrap_or_default(),
            user.user_id
        );
        Ok(created)
    }

    /// Replaces text and answers of a question owned by `user`.
    ///
    /// # Errors
    /// - `NotFound` when `question.question_id` is missing or unknown.
    /// - `Forbidden` when `user` does not own the stored question.
    pub fn update(&self, user: &User, question: Question) -> QuestionServiceResult<Question> {
        let question_id = question
            .question_id
            .ok_or(QuestionServiceError::NotFound(None))?;
        self.ensure_owner(user, question_id)?;

        let new_question = question.with_owner(user.user_id);
        let updated = self
            .controller
            .execute_and_query(|repo| repo.update(&new_question))?;

        info!(
            "event=question_update module=service status=ok question_id={} user_id={}",
            question_id, user.user_id
        );
        Ok(updated)
    }

    /// Looks up one question in the latest snapshot.
    pub fn read(&self, question_id: QuestionId) -> QuestionServiceResult<Option<Question>> {
        Ok(self.controller.read_only()?.read(question_id)?)
    }

    /// Lists all questions in creation order.
    pub fn read_all(&self) -> QuestionServiceResult<Vec<Question>> {
        Ok(self.controller.read_only()?.read_all()?)
    }

    /// Returns the most recently created question.
    pub fn read_latest(&self) -> QuestionServiceResult<Question> {
        self.controller
            .read_only()?
            .read_latest()?
            .ok_or(QuestionServiceError::NotFound(None))
    }

    /// Deletes a question owned by `user`, together with its votes.
    pub fn delete(&self, user: &User, question_id: QuestionId) -> QuestionServiceResult<()> {
        self.ensure_owner(user, question_id)?;
        self.controller.execute(|repo| repo.delete(question_id))?;

        info!(
            "event=question_delete module=service status=ok question_id={} user_id={}",
            question_id, user.user_id
        );
        Ok(())
    }

    /// Records one vote and returns the number of votes now held by `answer`.
    pub fn vote(&self, question_id: QuestionId, answer: &Answer) -> QuestionServiceResult<i64> {
        self.require(question_id)?;
        let count = self
            .controller
            .execute_and_query(|repo| repo.vote(question_id, answer))?;

        info!(
            "event=question_vote module=service status=ok question_id={} count={}",
            question_id, count
        );
        Ok(count)
    }

    /// Returns the current vote counts of one question.
    pub fn results(&self, question_id: QuestionId) -> QuestionServiceResult<VoteTally> {
        self.controller
            .read_only()?
            .tally(question_id)?
            .ok_or(QuestionServiceError::NotFound(Some(question_id)))
    }

    /// Verifies that a snapshot can be opened and read.
    pub fn health_check(&self) -> QuestionServiceResult<HealthStatus> {
        let question_count = self.controller.read_only()?.count()?;
        Ok(HealthStatus { question_count })
    }

    /// Closes the controller. Only the first call has an effect.
    pub fn shutdown(&self) -> QuestionServiceResult<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            warn!("event=service_shutdown module=service status=skipped reason=already_shut_down");
            return Ok(());
        }

        self.controller.close()?;
        info!("event=service_shutdown module=service status=ok");
        Ok(())
    }

    fn require(&self, question_id: QuestionId) -> QuestionServiceResult<Question> {
        self.read(question_id)?
            .ok_or(QuestionServiceError::NotFound(Some(question_id)))
    }

    fn ensure_owner(&self, user: &User, question_id: QuestionId) -> QuestionServiceResult<()> {
        let existing = self.require(question_id)?;
        if !existing.is_owned_by(user.user_id) {
            warn!(
                "event=ownership_check module=service status=denied question_id={} user_id={}",
                question_id, user.user_id
            );
            return Err(QuestionServiceError::Forbidden {
                question_id,
                user_id: user.user_id,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{QuestionService, QuestionServiceError};
    use crate::model::question::{Answer, Question};
    use crate::model::user::User;
    use crate::repo::question_repo::RepoError;
    use crate::store::{MemoryController, StoreError};

    fn service() -> QuestionService<MemoryController> {
        QuestionService::new(MemoryController::new())
    }

    #[test]
    fn update_without_id_is_not_found() {
        let service = service();
        let err = service
            .update(&User::new(1), Question::new("No id?", ["a"]))
            .unwrap_err();
        assert!(matches!(err, QuestionServiceError::NotFound(None)));
    }

    #[test]
    fn repo_not_found_maps_to_service_not_found() {
        let err: QuestionServiceError = StoreError::Repo(RepoError::NotFound(5)).into();
        assert!(matches!(err, QuestionServiceError::NotFound(Some(5))));
        assert!(err.is_not_found());
        assert!(!err.is_forbidden());
    }

    #[test]
    fn results_of_unknown_question_is_not_found() {
        let service = service();
        let err = service.results(3).unwrap_err();
        assert!(matches!(err, QuestionServiceError::NotFound(Some(3))));
    }

    #[test]
    fn operations_after_shutdown_fail_with_closed_store() {
        let service = service();
        service.shutdown().unwrap();
        service.shutdown().unwrap();

        let err = service
            .vote(1, &Answer::from("yes"))
            .expect_err("closed store must reject calls");
        assert!(matches!(err, QuestionServiceError::Store(StoreError::Closed)));
    }
}
