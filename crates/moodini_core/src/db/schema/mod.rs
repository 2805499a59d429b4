//! Versioned question schema.
//!
//! # Invariants
//! - Step versions start at 1 and grow by one per step.
//! - `PRAGMA user_version` always names the last step applied to a file.
//! - Pending steps run in one transaction, so a failing step leaves the file
//!   at the version it had before the upgrade started.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    label: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        label: "questions",
        sql: include_str!("0001_questions.sql"),
    },
    SchemaStep {
        version: 2,
        label: "votes",
        sql: include_str!("0002_votes.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Schema version recorded in the file behind `conn`; 0 for a fresh file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Brings `conn` up to [`latest_version`] and returns the version it had
/// before.
///
/// Files written by a newer build are refused rather than downgraded.
pub fn upgrade(conn: &mut Connection) -> DbResult<u32> {
    let found = schema_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::SchemaTooNew { found, supported });
    }

    let mut pending = STEPS.iter().filter(|step| step.version > found).peekable();
    if pending.peek().is_none() {
        return Ok(found);
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)?;
        let violations = dangling_references(&tx)?;
        if violations > 0 {
            return Err(DbError::BrokenReferences {
                version: step.version,
                violations,
            });
        }
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=schema_step module=db status=ok version={} label={}",
            step.version, step.label
        );
    }
    tx.commit()?;

    info!(
        "event=schema_upgrade module=db status=ok from_version={} to_version={}",
        found, supported
    );
    Ok(found)
}

fn dangling_references(conn: &Connection) -> DbResult<usize> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check;")?;
    let mut rows = stmt.query([])?;
    let mut violations = 0;
    while rows.next()?.is_some() {
        violations += 1;
    }
    Ok(violations)
}
