//! Materialized object graphs returned by the fetch engine.
//!
//! # Invariants
//! - Every collection is ordered by primary key, so graphs produced by
//!   different fetch strategies over the same store state compare equal.

use super::{Author, Book, Category};
use serde::Serialize;

/// One author with every owned book and each book's categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorGraph {
    pub author: Author,
    pub books: Vec<BookEntry>,
}

/// A book nested under its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookEntry {
    pub book: Book,
    pub categories: Vec<Category>,
}

/// One book with its resolved author and categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookGraph {
    pub book: Book,
    pub author: Option<Author>,
    pub categories: Vec<Category>,
}

impl AuthorGraph {
    pub fn book_count(&self) -> usize {
        self.books.len()
    }
}
