//! Question repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and vote APIs over canonical `questions` storage.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths require an owner (`user_id`) before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Listing order is `question_id ASC` (creation order).
//! - Callers own transaction boundaries; this repository never commits.

use crate::db::schema::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::question::{Answer, Question, QuestionId, VoteTally};
use crate::repo::now_epoch_ms;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const QUESTION_SELECT_SQL: &str = "SELECT
    question_id,
    user_id,
    question,
    created_at
FROM questions";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for question persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(QuestionId),
    /// Write payload lacks a field the store requires.
    MissingField(&'static str),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    InvalidData(String),
    /// The connection behind this reader was released by shutdown.
    ConnectionClosed,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "question not found: {id}"),
            Self::MissingField(field) => write!(f, "question field `{field}` is required"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "question repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "question repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted question data: {message}"),
            Self::ConnectionClosed => write!(f, "question store connection is closed"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Read-only view over stored questions.
pub trait QuestionReader {
    fn read(&self, question_id: QuestionId) -> RepoResult<Option<Question>>;
    /// All questions in ascending id order.
    fn read_all(&self) -> RepoResult<Vec<Question>>;
    /// Question with the highest id, if any.
    fn read_latest(&self) -> RepoResult<Option<Question>>;
    /// Vote counts, or `None` when the question does not exist.
    fn tally(&self, question_id: QuestionId) -> RepoResult<Option<VoteTally>>;
    fn count(&self) -> RepoResult<usize>;
}

/// Mutating repository. Implementations are driven by a persistence
/// controller that serializes calls.
pub trait QuestionRepository: QuestionReader {
    /// Stores a new question and returns it with id and timestamp assigned.
    fn create(&mut self, question: &Question) -> RepoResult<Question>;
    /// Replaces text, answers and owner of an existing question.
    fn update(&mut self, question: &Question) -> RepoResult<Question>;
    /// Removes a question together with its votes.
    fn delete(&mut self, question_id: QuestionId) -> RepoResult<()>;
    /// Records one vote and returns the new count for `answer`.
    fn vote(&mut self, question_id: QuestionId, answer: &Answer) -> RepoResult<i64>;
}

/// SQLite-backed question repository.
pub struct SqliteQuestionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteQuestionRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Wraps a connection whose schema was already checked by `try_new`.
    pub(crate) fn assume_ready(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl QuestionReader for SqliteQuestionRepository<'_> {
    fn read(&self, question_id: QuestionId) -> RepoResult<Option<Question>> {
        load_question(self.conn, question_id)
    }

    fn read_all(&self) -> RepoResult<Vec<Question>> {
        load_all_questions(self.conn)
    }

    fn read_latest(&self) -> RepoResult<Option<Question>> {
        load_latest_question(self.conn)
    }

    fn tally(&self, question_id: QuestionId) -> RepoResult<Option<VoteTally>> {
        load_tally(self.conn, question_id)
    }

    fn count(&self) -> RepoResult<usize> {
        count_questions(self.conn)
    }
}

impl QuestionRepository for SqliteQuestionRepository<'_> {
    fn create(&mut self, question: &Question) -> RepoResult<Question> {
        let user_id = question.user_id.ok_or(RepoError::MissingField("user_id"))?;

        let now = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO questions (user_id, question, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3);",
            params![user_id, question.question.as_str(), now],
        )?;
        let question_id = self.conn.last_insert_rowid();
        insert_answers(self.conn, question_id, &question.answers)?;

        load_question(self.conn, question_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("created question {question_id} missing in read-back"))
        })
    }

    fn update(&mut self, question: &Question) -> RepoResult<Question> {
        let question_id = question
            .question_id
            .ok_or(RepoError::MissingField("question_id"))?;
        let user_id = question.user_id.ok_or(RepoError::MissingField("user_id"))?;

        let changed = self.conn.execute(
            "UPDATE questions
             SET
                user_id = ?1,
                question = ?2,
                updated_at = ?3
             WHERE question_id = ?4;",
            params![
                user_id,
                question.question.as_str(),
                now_epoch_ms(),
                question_id
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(question_id));
        }

        self.conn.execute(
            "DELETE FROM question_answers WHERE question_id = ?1;",
            [question_id],
        )?;
        insert_answers(self.conn, question_id, &question.answers)?;

        load_question(self.conn, question_id)?.ok_or(RepoError::NotFound(question_id))
    }

    fn delete(&mut self, question_id: QuestionId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM questions WHERE question_id = ?1;",
            [question_id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(question_id));
        }

        Ok(())
    }

    fn vote(&mut self, question_id: QuestionId, answer: &Answer) -> RepoResult<i64> {
        if !question_exists(self.conn, question_id)? {
            return Err(RepoError::NotFound(question_id));
        }

        self.conn.execute(
            "INSERT INTO votes (question_id, answer, created_at) VALUES (?1, ?2, ?3);",
            params![question_id, answer.as_str(), now_epoch_ms()],
        )?;

        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM votes WHERE question_id = ?1 AND answer = ?2;",
            params![question_id, answer.as_str()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count)
    }
}

/// Loads one question by id.
pub(crate) fn load_question(
    conn: &Connection,
    question_id: QuestionId,
) -> RepoResult<Option<Question>> {
    let mut stmt = conn.prepare(&format!("{QUESTION_SELECT_SQL} WHERE question_id = ?1;"))?;
    let mut rows = stmt.query([question_id])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let mut question = parse_question_row(row)?;
    question.answers = load_answers(conn, question_id)?;
    Ok(Some(question))
}

pub(crate) fn load_all_questions(conn: &Connection) -> RepoResult<Vec<Question>> {
    let mut answers_by_question: HashMap<QuestionId, Vec<Answer>> = HashMap::new();
    let mut answer_stmt = conn.prepare(
        "SELECT question_id, answer
         FROM question_answers
         ORDER BY question_id ASC, position ASC;",
    )?;
    let mut answer_rows = answer_stmt.query([])?;
    while let Some(row) = answer_rows.next()? {
        let question_id: QuestionId = row.get(0)?;
        let answer: String = row.get(1)?;
        answers_by_question
            .entry(question_id)
            .or_default()
            .push(Answer(answer));
    }

    let mut stmt = conn.prepare(&format!("{QUESTION_SELECT_SQL} ORDER BY question_id ASC;"))?;
    let mut rows = stmt.query([])?;
    let mut questions = Vec::new();
    while let Some(row) = rows.next()? {
        let mut question = parse_question_row(row)?;
        if let Some(question_id) = question.question_id {
            question.answers = answers_by_question.remove(&question_id).unwrap_or_default();
        }
        questions.push(question);
    }

    Ok(questions)
}

pub(crate) fn load_latest_question(conn: &Connection) -> RepoResult<Option<Question>> {
    let latest_id: Option<QuestionId> = conn
        .query_row("SELECT MAX(question_id) FROM questions;", [], |row| {
            row.get::<_, Option<QuestionId>>(0)
        })
        .optional()?
        .flatten();

    match latest_id {
        Some(question_id) => load_question(conn, question_id),
        None => Ok(None),
    }
}

pub(crate) fn load_tally(
    conn: &Connection,
    question_id: QuestionId,
) -> RepoResult<Option<VoteTally>> {
    if !question_exists(conn, question_id)? {
        return Ok(None);
    }

    let mut stmt = conn.prepare(
        "SELECT answer, COUNT(*)
         FROM votes
         WHERE question_id = ?1
         GROUP BY answer;",
    )?;
    let mut rows = stmt.query([question_id])?;
    let mut tally = VoteTally::new(question_id);
    while let Some(row) = rows.next()? {
        let answer: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        tally.counts.insert(Answer(answer), count);
    }

    Ok(Some(tally))
}

pub(crate) fn count_questions(conn: &Connection) -> RepoResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM questions;", [], |row| row.get(0))?;
    usize::try_from(count)
        .map_err(|_| RepoError::InvalidData(format!("negative question count `{count}`")))
}

fn question_exists(conn: &Connection, question_id: QuestionId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM questions WHERE question_id = ?1);",
        [question_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn insert_answers(
    conn: &Connection,
    question_id: QuestionId,
    answers: &[Answer],
) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO question_answers (question_id, position, answer) VALUES (?1, ?2, ?3);",
    )?;
    for (position, answer) in answers.iter().enumerate() {
        let position = i64::try_from(position)
            .map_err(|_| RepoError::InvalidData(format!("answer position overflow: {position}")))?;
        stmt.execute(params![question_id, position, answer.as_str()])?;
    }
    Ok(())
}

fn load_answers(conn: &Connection, question_id: QuestionId) -> RepoResult<Vec<Answer>> {
    let mut stmt = conn.prepare(
        "SELECT answer
         FROM question_answers
         WHERE question_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([question_id])?;
    let mut answers = Vec::new();
    while let Some(row) = rows.next()? {
        answers.push(Answer(row.get(0)?));
    }
    Ok(answers)
}

fn parse_question_row(row: &Row<'_>) -> RepoResult<Question> {
    let question_id: QuestionId = row.get("question_id")?;
    let user_id: Option<i64> = row.get("user_id")?;
    let Some(user_id) = user_id else {
        return Err(RepoError::InvalidData(format!(
            "question {question_id} has no owner in questions.user_id"
        )));
    };

    Ok(Question {
        question_id: Some(question_id),
        user_id: Some(user_id),
        question: row.get("question")?,
        answers: Vec::new(),
        created: Some(row.get("created_at")?),
    })
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["questions", "question_answers", "votes"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
