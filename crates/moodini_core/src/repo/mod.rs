//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the read and mutate contracts over stored questions and votes.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Question ids are assigned in strictly increasing order.

pub mod memory_repo;
pub mod question_repo;

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock in Unix epoch milliseconds, shared by every backend so stored
/// timestamps have the same precision.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
