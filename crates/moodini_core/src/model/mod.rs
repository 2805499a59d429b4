//! Domain model for questions, answers, votes and users.
//!
//! # Responsibility
//! - Define canonical value types passed between service and storage.
//! - Keep updates as copy-with-changes instead of in-place mutation.
//!
//! # Invariants
//! - A stored `Question` always carries `question_id`, `user_id` and `created`.
//! - Only `User::user_id` takes part in authorization decisions.

pub mod question;
pub mod user;
