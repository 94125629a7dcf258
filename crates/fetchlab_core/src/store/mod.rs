//! Relational store contracts consumed by the cache layer.
//!
//! # Responsibility
//! - Define the narrow query interface (`execute_query`, `fetch_by_id`) the
//!   cache layer decorates.
//! - Provide the SQLite-backed implementation and its seeding batch.
//!
//! # Invariants
//! - Store calls never consult any cache and never touch statistics; that is
//!   the decorator's job.
//! - Rows are returned exactly as the database produced them, keyed by
//!   column alias.

use crate::db::DbError;
use crate::model::library::DraftError;
use crate::model::EntityKind;
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::ToSql;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod rows;
pub mod sqlite;

pub use sqlite::{LibraryCounts, SqliteStore, UnitOfWork};

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level failure.
#[derive(Debug)]
pub enum StoreError {
    /// Transport or database failure; never retried.
    Unavailable(DbError),
    /// Unique or foreign-key constraint rejected a write.
    Constraint(String),
    /// Seed draft failed validation before any write.
    InvalidDraft(DraftError),
    /// Row shape does not match what the caller selected.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(err) => write!(f, "store unavailable: {err}"),
            Self::Constraint(message) => write!(f, "constraint violation: {message}"),
            Self::InvalidDraft(err) => write!(f, "invalid seed draft: {err}"),
            Self::InvalidData(message) => write!(f, "invalid store row: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable(err) => Some(err),
            Self::InvalidDraft(err) => Some(err),
            Self::Constraint(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Unavailable(value)
    }
}

impl From<DraftError> for StoreError {
    fn from(value: DraftError) -> Self {
        Self::InvalidDraft(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(message.unwrap_or_else(|| code.to_string()))
            }
            other => Self::Unavailable(DbError::Sqlite(other)),
        }
    }
}

/// Bound query parameter. Hashable so it can be part of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryParam {
    Integer(i64),
    Text(String),
}

impl ToSql for QueryParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Integer(value) => value.to_sql(),
            Self::Text(value) => value.to_sql(),
        }
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl Display for QueryParam {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "'{value}'"),
        }
    }
}

/// One result row keyed by column alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreRow {
    values: HashMap<String, Value>,
}

impl StoreRow {
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self { values }
    }

    /// Whether the query selected `column` at all.
    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn opt_i64(&self, column: &str) -> StoreResult<Option<i64>> {
        match self.column(column)? {
            Value::Null => Ok(None),
            Value::Integer(value) => Ok(Some(*value)),
            other => Err(type_mismatch(column, "integer", other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> StoreResult<Option<String>> {
        match self.column(column)? {
            Value::Null => Ok(None),
            Value::Text(value) => Ok(Some(value.clone())),
            other => Err(type_mismatch(column, "text", other)),
        }
    }

    pub fn text(&self, column: &str) -> StoreResult<String> {
        self.opt_text(column)?
            .ok_or_else(|| StoreError::InvalidData(format!("column `{column}` is null")))
    }

    fn column(&self, column: &str) -> StoreResult<&Value> {
        self.values
            .get(column)
            .ok_or_else(|| StoreError::InvalidData(format!("column `{column}` was not selected")))
    }
}

fn type_mismatch(column: &str, expected: &str, actual: &Value) -> StoreError {
    StoreError::InvalidData(format!(
        "column `{column}` expected {expected}, got {:?}",
        actual.data_type()
    ))
}

/// Raw store access decorated by the cache layer.
pub trait RelationalStore {
    /// Runs one read query and returns every row.
    fn execute_query(&self, text: &str, params: &[QueryParam]) -> StoreResult<Vec<StoreRow>>;

    /// Loads one record by primary key; `None` when absent.
    fn fetch_by_id(&self, kind: EntityKind, id: i64) -> StoreResult<Option<StoreRow>>;
}

impl<S: RelationalStore + ?Sized> RelationalStore for &S {
    fn execute_query(&self, text: &str, params: &[QueryParam]) -> StoreResult<Vec<StoreRow>> {
        (**self).execute_query(text, params)
    }

    fn fetch_by_id(&self, kind: EntityKind, id: i64) -> StoreResult<Option<StoreRow>> {
        (**self).fetch_by_id(kind, id)
    }
}
