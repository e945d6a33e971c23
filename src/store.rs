//! Persistence boundary
//!
//! The engine never decides where results live. Hosts plug in a
//! [`ResultStore`]; [`MemoryStore`] is the in-process implementation used for
//! demo mode, the CLI and tests.

use crate::error::EngageError;
use crate::types::{HistoricalSession, PracticeRecord, TestRecord};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Practice records kept by [`MemoryStore`]
pub const MAX_PRACTICE_RECORDS: usize = 100;

/// Test records kept by [`MemoryStore`]
pub const MAX_TEST_RECORDS: usize = 50;

/// Where finished practice and test results are stored
pub trait ResultStore {
    /// Store a practice session, returning its identifier
    fn save_practice(&mut self, record: &PracticeRecord) -> Result<String, EngageError>;

    /// Store a test session, returning its identifier
    fn save_test(&mut self, record: &TestRecord) -> Result<String, EngageError>;

    /// Up to `limit` most recent practice sessions of a user, newest first.
    /// Lookup failures yield an empty list.
    fn recent_practice(&self, user_id: &str, limit: usize) -> Vec<HistoricalSession>;

    /// Most recent practice session of a user for one routine
    fn last_practice_for_routine(&self, user_id: &str, routine_id: &str) -> Option<HistoricalSession>;
}

/// In-memory store, newest first, capped like the host's demo storage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    practice: VecDeque<PracticeRecord>,
    tests: VecDeque<TestRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn practice_records(&self) -> impl Iterator<Item = &PracticeRecord> {
        self.practice.iter()
    }

    pub fn test_records(&self) -> impl Iterator<Item = &TestRecord> {
        self.tests.iter()
    }

    /// Load a store snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self, EngageError> {
        serde_json::from_str(json).map_err(EngageError::JsonError)
    }

    /// Serialize a store snapshot to JSON
    pub fn to_json(&self) -> Result<String, EngageError> {
        serde_json::to_string(self).map_err(EngageError::JsonError)
    }
}

impl ResultStore for MemoryStore {
    fn save_practice(&mut self, record: &PracticeRecord) -> Result<String, EngageError> {
        if record.user_id.is_empty() {
            return Err(EngageError::Persistence("missing user id".to_string()));
        }
        self.practice.push_front(record.clone());
        self.practice.truncate(MAX_PRACTICE_RECORDS);
        Ok(record.id.to_string())
    }

    fn save_test(&mut self, record: &TestRecord) -> Result<String, EngageError> {
        if record.user_id.is_empty() {
            return Err(EngageError::Persistence("missing user id".to_string()));
        }
        self.tests.push_front(record.clone());
        self.tests.truncate(MAX_TEST_RECORDS);
        Ok(record.id.to_string())
    }

    fn recent_practice(&self, user_id: &str, limit: usize) -> Vec<HistoricalSession> {
        self.practice
            .iter()
            .filter(|r| r.user_id == user_id)
            .take(limit)
            .map(HistoricalSession::from)
            .collect()
    }

    fn last_practice_for_routine(&self, user_id: &str, routine_id: &str) -> Option<HistoricalSession> {
        self.practice
            .iter()
            .find(|r| r.user_id == user_id && r.routine_id.as_deref() == Some(routine_id))
            .map(HistoricalSession::from)
    }
}
