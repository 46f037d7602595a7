//! Letter Store: persisted letters keyed by admission with history and a
//! "current" pointer, plus admission bookkeeping.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, TransactionBehavior};

use crate::db::{self, repository, DatabaseError};
use crate::models::enums::{AttemptStatus, Environment};
use crate::models::{Admission, AdmissionRecord, Feedback, GeneratedLetter, RequestLogEntry};

/// Result of [`LetterStore::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Inserted and now the admission's current letter.
    Current,
    /// Inserted, but an existing letter is newer and stays current.
    Superseded,
    /// A letter with the same admission and timestamp already exists.
    Duplicate,
}

pub trait LetterStore: Send + Sync {
    /// Insert a letter. Idempotent on (admission id, generation timestamp).
    fn save(&self, letter: &GeneratedLetter) -> Result<SaveOutcome, DatabaseError>;

    /// The admission's current letter, whatever its outcome.
    fn get_latest(&self, admission_id: &str) -> Result<Option<GeneratedLetter>, DatabaseError>;

    fn latest_successful(&self, admission_id: &str) -> Result<Option<GeneratedLetter>, DatabaseError>;

    /// All letters for the admission, newest first.
    fn history(&self, admission_id: &str) -> Result<Vec<GeneratedLetter>, DatabaseError>;

    /// Delete every letter generated before now minus `window`.
    fn purge_older_than(&self, window: Duration) -> Result<usize, DatabaseError>;

    fn delete_environment(&self, environment: Environment) -> Result<usize, DatabaseError>;

    /// Upsert the admission and stamp the outcome of this attempt on it.
    fn record_attempt(
        &self,
        admission: &Admission,
        status: AttemptStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    fn find_admission(&self, admission_id: &str) -> Result<Option<AdmissionRecord>, DatabaseError>;
}

/// SQLite-backed store. One connection behind a mutex serializes writers;
/// the current-pointer update runs inside an immediate transaction.
pub struct SqliteLetterStore {
    conn: Mutex<Connection>,
}

impl SqliteLetterStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(db::open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(db::open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }

    pub fn add_feedback(&self, feedback: &Feedback) -> Result<(), DatabaseError> {
        repository::insert_feedback(&*self.conn()?, feedback)
    }

    pub fn feedback_for(&self, admission_id: &str) -> Result<Vec<Feedback>, DatabaseError> {
        repository::list_feedback(&*self.conn()?, admission_id)
    }

    pub fn log_request(&self, entry: &RequestLogEntry) -> Result<(), DatabaseError> {
        repository::insert_request_log(&*self.conn()?, entry)
    }

    pub fn recent_requests(&self, limit: usize) -> Result<Vec<RequestLogEntry>, DatabaseError> {
        repository::list_recent_requests(&*self.conn()?, limit)
    }

    /// Purge relative to an explicit clock.
    pub fn purge_generated_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let deleted = repository::delete_letters_before(&tx, &cutoff)?;
        tx.commit()?;
        tracing::info!(target: "audit", deleted, cutoff = %cutoff, "Letters purged");
        Ok(deleted)
    }
}

impl LetterStore for SqliteLetterStore {
    fn save(&self, letter: &GeneratedLetter) -> Result<SaveOutcome, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if repository::find_letter_at(&tx, &letter.admission_id, &letter.generated_at)?.is_some() {
            tx.commit()?;
            return Ok(SaveOutcome::Duplicate);
        }

        let current = repository::get_current_letter(&tx, &letter.admission_id)?;
        let becomes_current = current.map_or(true, |c| letter.generated_at > c.generated_at);
        if becomes_current {
            repository::demote_current_letter(&tx, &letter.admission_id)?;
        }
        repository::insert_letter(&tx, letter, becomes_current)?;
        tx.commit()?;

        Ok(if becomes_current {
            SaveOutcome::Current
        } else {
            SaveOutcome::Superseded
        })
    }

    fn get_latest(&self, admission_id: &str) -> Result<Option<GeneratedLetter>, DatabaseError> {
        repository::get_current_letter(&*self.conn()?, admission_id)
    }

    fn latest_successful(&self, admission_id: &str) -> Result<Option<GeneratedLetter>, DatabaseError> {
        repository::get_latest_successful_letter(&*self.conn()?, admission_id)
    }

    fn history(&self, admission_id: &str) -> Result<Vec<GeneratedLetter>, DatabaseError> {
        repository::list_letters(&*self.conn()?, admission_id)
    }

    fn purge_older_than(&self, window: Duration) -> Result<usize, DatabaseError> {
        // A cutoff before the representable range cannot have older letters
        match Utc::now().checked_sub_signed(window) {
            Some(cutoff) => self.purge_generated_before(cutoff),
            None => Ok(0),
        }
    }

    fn delete_environment(&self, environment: Environment) -> Result<usize, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let deleted = repository::delete_letters_by_environment(&tx, environment)?;
        tx.commit()?;
        tracing::info!(target: "audit", deleted, environment = %environment, "Environment letters deleted");
        Ok(deleted)
    }

    fn record_attempt(
        &self,
        admission: &Admission,
        status: AttemptStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        repository::upsert_admission(&tx, admission)?;
        repository::record_admission_attempt(
            &tx,
            admission.source_system,
            &admission.admission_id,
            status,
            &at,
        )?;
        tx.commit()?;
        Ok(())
    }

    fn find_admission(&self, admission_id: &str) -> Result<Option<AdmissionRecord>, DatabaseError> {
        repository::find_admission(&*self.conn()?, admission_id)
    }
}
