//! SQLite-backed relational store.
//!
//! # Responsibility
//! - Serve `execute_query`/`fetch_by_id` on a migrated connection.
//! - Hand out `UnitOfWork` guards scoping connection use per measured
//!   operation.
//! - Persist a `LibraryDraft` in one all-or-nothing transaction.
//!
//! # Invariants
//! - Seeding either commits every row of the draft or none of them.
//! - A `UnitOfWork` releases its borrow on every exit path, including early
//!   returns through `?`.

use super::rows::select_by_id_sql;
use super::{QueryParam, RelationalStore, StoreError, StoreResult, StoreRow};
use crate::config::DatabaseLocation;
use crate::db::{open_db, open_db_in_memory};
use crate::model::library::{DraftError, LibraryDraft};
use crate::model::EntityKind;
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// Row counts per table, as written by a seed or read back from the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LibraryCounts {
    pub authors: usize,
    pub books: usize,
    pub categories: usize,
    pub memberships: usize,
}

impl LibraryCounts {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Relational store over one SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a fresh, migrated in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    pub fn open_location(location: &DatabaseLocation) -> StoreResult<Self> {
        match location {
            DatabaseLocation::Memory => Self::open_in_memory(),
            DatabaseLocation::File(path) => Self::open(path),
        }
    }

    /// Wraps a connection that already went through `db::open_*`.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Raw connection access for diagnostics and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Starts a scoped unit of work over this store.
    pub fn unit_of_work(&self, label: &'static str) -> UnitOfWork<'_> {
        debug!("event=unit_of_work module=store status=acquired label={label}");
        UnitOfWork {
            store: self,
            label,
            started_at: Instant::now(),
            round_trips: Cell::new(0),
        }
    }

    /// Persists the whole draft in one transaction.
    ///
    /// # Errors
    /// - `InvalidDraft` when the draft fails validation; nothing is written.
    /// - `Constraint` when a row clashes with data already in the store.
    /// - `Unavailable` on any other database failure.
    ///
    /// On every error the transaction is rolled back.
    pub fn seed(&mut self, draft: &LibraryDraft) -> StoreResult<LibraryCounts> {
        let started_at = Instant::now();
        if let Err(err) = draft.validate() {
            warn!(
                "event=store_seed module=store status=rejected error_code=invalid_draft error={}",
                err
            );
            return Err(err.into());
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        match insert_draft(&tx, draft) {
            Ok(counts) => {
                tx.commit()?;
                info!(
                    "event=store_seed module=store status=ok authors={} books={} categories={} memberships={} duration_ms={}",
                    counts.authors,
                    counts.books,
                    counts.categories,
                    counts.memberships,
                    started_at.elapsed().as_millis()
                );
                Ok(counts)
            }
            Err(err) => {
                // Dropping `tx` rolls the batch back.
                drop(tx);
                error!(
                    "event=store_seed module=store status=rolled_back duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Counts rows in every library table.
    pub fn counts(&self) -> StoreResult<LibraryCounts> {
        let counts = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM authors),
                (SELECT COUNT(*) FROM books),
                (SELECT COUNT(*) FROM categories),
                (SELECT COUNT(*) FROM book_categories);",
            [],
            |row| {
                Ok(LibraryCounts {
                    authors: row.get(0)?,
                    books: row.get(1)?,
                    categories: row.get(2)?,
                    memberships: row.get(3)?,
                })
            },
        )?;
        Ok(counts)
    }
}

impl RelationalStore for SqliteStore {
    fn execute_query(&self, text: &str, params: &[QueryParam]) -> StoreResult<Vec<StoreRow>> {
        let mut stmt = self.conn.prepare_cached(text)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = HashMap::with_capacity(columns.len());
            for (index, name) in columns.iter().enumerate() {
                values.insert(name.clone(), row.get::<_, Value>(index)?);
            }
            out.push(StoreRow::new(values));
        }
        Ok(out)
    }

    fn fetch_by_id(&self, kind: EntityKind, id: i64) -> StoreResult<Option<StoreRow>> {
        let mut rows = self.execute_query(&select_by_id_sql(kind), &[QueryParam::Integer(id)])?;
        Ok(rows.pop())
    }
}

/// Scoped borrow of the store for one measured operation.
///
/// Logs its release, with the number of store round trips it served, when
/// dropped.
pub struct UnitOfWork<'s> {
    store: &'s SqliteStore,
    label: &'static str,
    started_at: Instant,
    round_trips: Cell<u64>,
}

impl UnitOfWork<'_> {
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Store calls served so far (queries and by-id fetches).
    pub fn round_trips(&self) -> u64 {
        self.round_trips.get()
    }

    fn count_round_trip(&self) {
        self.round_trips.set(self.round_trips.get() + 1);
    }
}

impl RelationalStore for UnitOfWork<'_> {
    fn execute_query(&self, text: &str, params: &[QueryParam]) -> StoreResult<Vec<StoreRow>> {
        self.count_round_trip();
        self.store.execute_query(text, params)
    }

    fn fetch_by_id(&self, kind: EntityKind, id: i64) -> StoreResult<Option<StoreRow>> {
        self.count_round_trip();
        self.store.fetch_by_id(kind, id)
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        debug!(
            "event=unit_of_work module=store status=released label={} round_trips={} duration_ms={}",
            self.label,
            self.round_trips.get(),
            self.started_at.elapsed().as_millis()
        );
    }
}

fn insert_draft(tx: &Transaction<'_>, draft: &LibraryDraft) -> StoreResult<LibraryCounts> {
    let mut counts = LibraryCounts::default();

    let mut category_ids = Vec::new();
    for (_, category) in draft.categories() {
        tx.execute(
            "INSERT INTO categories (name, description) VALUES (?1, ?2);",
            params![category.name, category.description],
        )?;
        category_ids.push(tx.last_insert_rowid());
        counts.categories += 1;
    }

    let mut author_ids = Vec::new();
    for (_, author) in draft.authors() {
        tx.execute(
            "INSERT INTO authors (first_name, last_name, email) VALUES (?1, ?2, ?3);",
            params![author.first_name, author.last_name, author.email],
        )?;
        author_ids.push(tx.last_insert_rowid());
        counts.authors += 1;
    }

    for (_, book) in draft.books() {
        let author_id = match book.author() {
            Some(handle) => Some(lookup_id(&author_ids, EntityKind::Author, handle.index())?),
            None => None,
        };
        tx.execute(
            "INSERT INTO books (title, publication_year, isbn, summary, author_id)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                book.title,
                book.publication_year,
                book.isbn,
                book.summary,
                author_id
            ],
        )?;
        let book_id = tx.last_insert_rowid();
        counts.books += 1;

        for category in book.categories() {
            let category_id = lookup_id(&category_ids, EntityKind::Category, category.index())?;
            tx.execute(
                "INSERT INTO book_categories (book_id, category_id) VALUES (?1, ?2);",
                params![book_id, category_id],
            )?;
            counts.memberships += 1;
        }
    }

    Ok(counts)
}

fn lookup_id(ids: &[i64], kind: EntityKind, index: usize) -> StoreResult<i64> {
    ids.get(index)
        .copied()
        .ok_or(StoreError::InvalidDraft(DraftError::UnknownHandle { kind, index }))
}
