//! In-memory question repository.
//!
//! # Invariants
//! - Ids start at 1 and are never reused, even after delete.
//! - State lives in persistent ordered maps: cloning is O(1) and shares
//!   structure, and a write on one clone never shows through another.

use crate::model::question::{Answer, Question, QuestionId, VoteTally};
use crate::repo::now_epoch_ms;
use crate::repo::question_repo::{QuestionReader, QuestionRepository, RepoError, RepoResult};
use im::OrdMap;

/// Ordered map based repository state.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuestionRepository {
    questions: OrdMap<QuestionId, Question>,
    votes: OrdMap<QuestionId, OrdMap<Answer, i64>>,
    last_id: QuestionId,
}

impl MemoryQuestionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuestionReader for MemoryQuestionRepository {
    fn read(&self, question_id: QuestionId) -> RepoResult<Option<Question>> {
        Ok(self.questions.get(&question_id).cloned())
    }

    fn read_all(&self) -> RepoResult<Vec<Question>> {
        Ok(self.questions.values().cloned().collect())
    }

    fn read_latest(&self) -> RepoResult<Option<Question>> {
        Ok(self
            .questions
            .get_max()
            .map(|(_, question)| question.clone()))
    }

    fn tally(&self, question_id: QuestionId) -> RepoResult<Option<VoteTally>> {
        if !self.questions.contains_key(&question_id) {
            return Ok(None);
        }

        let mut tally = VoteTally::new(question_id);
        if let Some(counts) = self.votes.get(&question_id) {
            tally.counts = counts
                .iter()
                .map(|(answer, count)| (answer.clone(), *count))
                .collect();
        }
        Ok(Some(tally))
    }

    fn count(&self) -> RepoResult<usize> {
        Ok(self.questions.len())
    }
}

impl QuestionRepository for MemoryQuestionRepository {
    fn create(&mut self, question: &Question) -> RepoResult<Question> {
        let user_id = question.user_id.ok_or(RepoError::MissingField("user_id"))?;

        let question_id = self.last_id + 1;
        let stored = Question {
            question_id: Some(question_id),
            user_id: Some(user_id),
            created: Some(now_epoch_ms()),
            ..question.clone()
        };
        self.questions.insert(question_id, stored.clone());
        self.last_id = question_id;
        Ok(stored)
    }

    fn update(&mut self, question: &Question) -> RepoResult<Question> {
        let question_id = question
            .question_id
            .ok_or(RepoError::MissingField("question_id"))?;
        let user_id = question.user_id.ok_or(RepoError::MissingField("user_id"))?;

        let created = self
            .questions
            .get(&question_id)
            .ok_or(RepoError::NotFound(question_id))?
            .created;
        let stored = Question {
            question_id: Some(question_id),
            user_id: Some(user_id),
            created,
            ..question.clone()
        };
        self.questions.insert(question_id, stored.clone());
        Ok(stored)
    }

    fn delete(&mut self, question_id: QuestionId) -> RepoResult<()> {
        self.questions
            .remove(&question_id)
            .ok_or(RepoError::NotFound(question_id))?;
        self.votes.remove(&question_id);
        Ok(())
    }

    fn vote(&mut self, question_id: QuestionId, answer: &Answer) -> RepoResult<i64> {
        if !self.questions.contains_key(&question_id) {
            return Err(RepoError::NotFound(question_id));
        }

        let mut counts = self.votes.get(&question_id).cloned().unwrap_or_default();
        let count = counts.get(answer).copied().unwrap_or(0) + 1;
        counts.insert(answer.clone(), count);
        self.votes.insert(question_id, counts);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryQuestionRepository;
    use crate::model::question::{Answer, Question};
    use crate::repo::question_repo::{QuestionReader, QuestionRepository, RepoError};

    #[test]
    fn ids_are_not_reused_after_delete() {
        let mut repo = MemoryQuestionRepository::new();
        let first = repo
            .create(&Question::new("One?", ["a"]).with_owner(1))
            .unwrap();
        repo.delete(first.question_id.unwrap()).unwrap();
        let second = repo
            .create(&Question::new("Two?", ["b"]).with_owner(1))
            .unwrap();

        assert_eq!(first.question_id, Some(1));
        assert_eq!(second.question_id, Some(2));
    }

    #[test]
    fn update_preserves_created_timestamp() {
        let mut repo = MemoryQuestionRepository::new();
        let created = repo
            .create(&Question::new("Draft?", ["x"]).with_owner(3))
            .unwrap();

        let mut changed = created.clone();
        changed.question = "Final?".to_string();
        changed.created = Some(0);
        let updated = repo.update(&changed).unwrap();

        assert_eq!(updated.created, created.created);
        assert_eq!(updated.question, "Final?");
    }

    #[test]
    fn create_without_owner_is_rejected() {
        let mut repo = MemoryQuestionRepository::new();
        let err = repo.create(&Question::new("Anonymous?", ["y"])).unwrap_err();
        assert!(matches!(err, RepoError::MissingField("user_id")));
    }

    #[test]
    fn clone_is_isolated_from_later_writes() {
        let mut repo = MemoryQuestionRepository::new();
        let created = repo
            .create(&Question::new("Shared?", ["yes", "no"]).with_owner(2))
            .unwrap();
        let question_id = created.question_id.unwrap();
        repo.vote(question_id, &Answer::from("yes")).unwrap();

        let frozen = repo.clone();
        repo.vote(question_id, &Answer::from("yes")).unwrap();
        repo.update(&Question::new("Changed?", ["yes"]).with_id(question_id).with_owner(2))
            .unwrap();
        repo.create(&Question::new("Another?", ["a"]).with_owner(2))
            .unwrap();

        assert_eq!(frozen.count().unwrap(), 1);
        assert_eq!(frozen.read(question_id).unwrap(), Some(created));
        let tally = frozen.tally(question_id).unwrap().unwrap();
        assert_eq!(tally.count(&Answer::from("yes")), 1);
        assert_eq!(repo.tally(question_id).unwrap().unwrap().count(&Answer::from("yes")), 2);
    }

    #[test]
    fn delete_drops_votes() {
        let mut repo = MemoryQuestionRepository::new();
        let created = repo
            .create(&Question::new("Mood?", ["good"]).with_owner(1))
            .unwrap();
        let question_id = created.question_id.unwrap();
        repo.vote(question_id, &Answer::from("good")).unwrap();
        repo.delete(question_id).unwrap();

        assert!(repo.tally(question_id).unwrap().is_none());
        assert!(matches!(
            repo.vote(question_id, &Answer::from("good")),
            Err(RepoError::NotFound(id)) if id == question_id
        ));
    }
}
