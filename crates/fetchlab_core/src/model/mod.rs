//! Library domain model: authors, books, categories and their relations.
//!
//! # Responsibility
//! - Define scalar entity snapshots shared by the store, cache and engine.
//! - Name entity kinds and the relationships between them.
//! - Own the two-sided link/unlink operations used while drafting a seed
//!   batch.
//!
//! # Invariants
//! - Snapshots carry scalar fields and foreign keys only; relationship
//!   collections are resolved by the fetch engine, never stored on them.
//! - A `Relation` always points from its `source()` kind to its `target()`
//!   kind.

pub mod author;
pub mod book;
pub mod category;
pub mod graph;
pub mod library;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub use author::{Author, AuthorId};
pub use book::{Book, BookId};
pub use category::{Category, CategoryId};
pub use graph::{AuthorGraph, BookEntry, BookGraph};
pub use library::LibraryDraft;

/// The three persisted entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Author,
    Book,
    Category,
}

impl EntityKind {
    /// Stable lowercase name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Book => "book",
            Self::Category => "category",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one persisted record: kind plus primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Any entity snapshot, as held by the entity cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Author(Author),
    Book(Book),
    Category(Category),
}

impl Entity {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Author(author) => EntityKey::new(EntityKind::Author, author.id),
            Self::Book(book) => EntityKey::new(EntityKind::Book, book.id),
            Self::Category(category) => EntityKey::new(EntityKind::Category, category.id),
        }
    }

    pub fn into_author(self) -> Option<Author> {
        match self {
            Self::Author(author) => Some(author),
            _ => None,
        }
    }

    pub fn into_book(self) -> Option<Book> {
        match self {
            Self::Book(book) => Some(book),
            _ => None,
        }
    }

    pub fn into_category(self) -> Option<Category> {
        match self {
            Self::Category(category) => Some(category),
            _ => None,
        }
    }
}

/// Navigable relationships between entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Author -> its owned books (one-to-many).
    AuthorBooks,
    /// Book -> its author (non-owning back-reference, nullable).
    BookAuthor,
    /// Book -> its categories (many-to-many, shared membership).
    BookCategories,
}

impl Relation {
    pub fn source(self) -> EntityKind {
        match self {
            Self::AuthorBooks => EntityKind::Author,
            Self::BookAuthor | Self::BookCategories => EntityKind::Book,
        }
    }

    pub fn target(self) -> EntityKind {
        match self {
            Self::AuthorBooks => EntityKind::Book,
            Self::BookAuthor => EntityKind::Author,
            Self::BookCategories => EntityKind::Category,
        }
    }

    /// Attribute name on the source entity.
    pub fn name(self) -> &'static str {
        match self {
            Self::AuthorBooks => "books",
            Self::BookAuthor => "author",
            Self::BookCategories => "categories",
        }
    }
}

impl Display for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.source(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, Relation};

    #[test]
    fn relations_point_from_source_to_target() {
        assert_eq!(Relation::AuthorBooks.source(), EntityKind::Author);
        assert_eq!(Relation::AuthorBooks.target(), EntityKind::Book);
        assert_eq!(Relation::BookCategories.target(), EntityKind::Category);
        assert_eq!(Relation::BookAuthor.to_string(), "book.author");
    }
}
