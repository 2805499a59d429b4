//! Question domain model.
//!
//! # Responsibility
//! - Define the question record exchanged with callers and storage.
//! - Provide copy-with-changes helpers used by the service layer.
//!
//! # Invariants
//! - `question_id` is assigned by the store and never reused.
//! - `created` is assigned by the store on create and preserved on update.
//! - `answers` keeps caller order.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Store-assigned question identifier.
pub type QuestionId = i64;

/// One selectable option of a question and the target of a vote.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answer(pub String);

impl Answer {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Answer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Answer {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Answer {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Poll question with its ordered answer options.
///
/// Caller payloads usually leave `question_id`, `user_id` and `created`
/// empty; the service and store fill them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub question_id: Option<QuestionId>,
    /// Owner. Always overwritten from the authenticated user on write paths.
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub question: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub created: Option<i64>,
}

impl Question {
    /// Creates an unsaved question payload.
    pub fn new<I, A>(question: impl Into<String>, answers: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Answer>,
    {
        Self {
            question_id: None,
            user_id: None,
            question: question.into(),
            answers: answers.into_iter().map(Into::into).collect(),
            created: None,
        }
    }

    /// Returns a copy owned by `user_id`.
    pub fn with_owner(self, user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..self
        }
    }

    /// Returns a copy addressed at `question_id`.
    pub fn with_id(self, question_id: QuestionId) -> Self {
        Self {
            question_id: Some(question_id),
            ..self
        }
    }

    /// Returns whether `user_id` owns this question.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }
}

/// Vote counts per answer for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub question_id: QuestionId,
    pub counts: BTreeMap<Answer, i64>,
}

impl VoteTally {
    pub fn new(question_id: QuestionId) -> Self {
        Self {
            question_id,
            counts: BTreeMap::new(),
        }
    }

    /// Votes recorded for `answer`, zero when none.
    pub fn count(&self, answer: &Answer) -> i64 {
        self.counts.get(answer).copied().unwrap_or(0)
    }

    /// Votes recorded across all answers.
    pub fn total(&self) -> i64 {
        self.counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{Answer, Question, VoteTally};

    #[test]
    fn with_owner_replaces_existing_owner_only() {
        let original = Question::new("Favorite color?", ["Red", "Blue"]).with_id(7);
        let stamped = original.clone().with_owner(11).with_owner(42);

        assert_eq!(stamped.user_id, Some(42));
        assert_eq!(stamped.question_id, Some(7));
        assert_eq!(stamped.question, original.question);
        assert_eq!(stamped.answers, original.answers);
    }

    #[test]
    fn payload_without_server_fields_deserializes() {
        let question: Question =
            serde_json::from_str(r#"{"question":"Lunch?","answers":["Pizza","Sushi"]}"#)
                .expect("payload should parse");

        assert_eq!(question.question_id, None);
        assert_eq!(question.user_id, None);
        assert_eq!(question.answers, vec![Answer::from("Pizza"), Answer::from("Sushi")]);
    }

    #[test]
    fn tally_counts_missing_answer_as_zero() {
        let mut tally = VoteTally::new(1);
        tally.counts.insert(Answer::from("Red"), 3);
        tally.counts.insert(Answer::from("Blue"), 2);

        assert_eq!(tally.count(&Answer::from("Green")), 0);
        assert_eq!(tally.total(), 5);
    }
}
