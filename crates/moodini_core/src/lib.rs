//! Core question service for Moodini polls.
//! Owns ownership rules, vote bookkeeping and the question store contracts.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{ConfigError, ServiceConfig, StoreBackend};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::question::{Answer, Question, QuestionId, VoteTally};
pub use model::user::{User, UserId};
pub use repo::memory_repo::MemoryQuestionRepository;
pub use repo::question_repo::{
    QuestionReader, QuestionRepository, RepoError, RepoResult, SqliteQuestionRepository,
};
pub use service::question_service::{
    HealthStatus, QuestionService, QuestionServiceError, QuestionServiceResult,
};
pub use store::{
    MemoryController, MemorySnapshot, PersistenceController, SqliteController, SqliteSnapshot,
    StoreError, StoreResult,
};
