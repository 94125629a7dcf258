//! Book snapshot.

use super::author::AuthorId;
use serde::{Deserialize, Serialize};

/// Primary key of a book row.
pub type BookId = i64;

/// Longest summary the schema accepts, in characters.
pub const SUMMARY_MAX_CHARS: usize = 2000;

/// Scalar snapshot of one book.
///
/// `author_id` is a non-owning navigation link; categories are resolved
/// through the fetch engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub publication_year: Option<i32>,
    /// Unique across the store when set.
    pub isbn: Option<String>,
    pub summary: Option<String>,
    pub author_id: Option<AuthorId>,
}
