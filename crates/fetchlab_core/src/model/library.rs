//! In-memory draft of a seed batch with two-sided relationship updates.
//!
//! # Responsibility
//! - Collect authors, books and categories before they are persisted in one
//!   atomic batch.
//! - Keep both sides of Author<->Book and Book<->Category consistent through
//!   explicit `link_*`/`unlink_*` calls.
//!
//! # Invariants
//! - A book belongs to at most one author; linking it to another author
//!   removes it from the previous author's list.
//! - `DraftBook::categories` and `DraftCategory::books` are mirror images.
//! - Relationship collections are private; only link/unlink mutate them.

use super::book::SUMMARY_MAX_CHARS;
use super::category::DESCRIPTION_MAX_CHARS;
use super::EntityKind;
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DraftResult<T> = Result<T, DraftError>;

/// Validation and handle errors raised while drafting a seed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    /// Handle does not belong to this draft.
    UnknownHandle { kind: EntityKind, index: usize },
    /// Required text field is empty after trimming.
    BlankField {
        kind: EntityKind,
        field: &'static str,
    },
    /// Text field exceeds the schema limit.
    FieldTooLong {
        kind: EntityKind,
        field: &'static str,
        max_chars: usize,
    },
    /// Unique field value appears twice in the draft.
    Duplicate {
        kind: EntityKind,
        field: &'static str,
        value: String,
    },
}

impl Display for DraftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownHandle { kind, index } => {
                write!(f, "unknown {kind} handle #{index} for this draft")
            }
            Self::BlankField { kind, field } => write!(f, "{kind}.{field} cannot be blank"),
            Self::FieldTooLong {
                kind,
                field,
                max_chars,
            } => write!(f, "{kind}.{field} exceeds {max_chars} characters"),
            Self::Duplicate { kind, field, value } => {
                write!(f, "duplicate {kind}.{field} value `{value}`")
            }
        }
    }
}

impl Error for DraftError {}

/// Position of an author inside its draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthorHandle(usize);

/// Position of a book inside its draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookHandle(usize);

/// Position of a category inside its draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryHandle(usize);

impl AuthorHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl BookHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl CategoryHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftAuthor {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    books: Vec<BookHandle>,
}

impl DraftAuthor {
    /// Owned books in insertion order.
    pub fn books(&self) -> &[BookHandle] {
        &self.books
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftBook {
    pub title: String,
    pub publication_year: Option<i32>,
    pub isbn: Option<String>,
    pub summary: Option<String>,
    author: Option<AuthorHandle>,
    categories: BTreeSet<CategoryHandle>,
}

impl DraftBook {
    pub fn author(&self) -> Option<AuthorHandle> {
        self.author
    }

    pub fn categories(&self) -> impl Iterator<Item = CategoryHandle> + '_ {
        self.categories.iter().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftCategory {
    pub name: String,
    pub description: Option<String>,
    books: BTreeSet<BookHandle>,
}

impl DraftCategory {
    pub fn books(&self) -> impl Iterator<Item = BookHandle> + '_ {
        self.books.iter().copied()
    }
}

/// Seed batch under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryDraft {
    authors: Vec<DraftAuthor>,
    books: Vec<DraftBook>,
    categories: Vec<DraftCategory>,
}

impl LibraryDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty() && self.books.is_empty() && self.categories.is_empty()
    }

    pub fn add_author(
        &mut self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> AuthorHandle {
        self.authors.push(DraftAuthor {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            books: Vec::new(),
        });
        AuthorHandle(self.authors.len() - 1)
    }

    /// Adds a book without author or categories.
    pub fn add_book(
        &mut self,
        title: impl Into<String>,
        publication_year: Option<i32>,
        isbn: Option<String>,
    ) -> BookHandle {
        self.books.push(DraftBook {
            title: title.into(),
            publication_year,
            isbn,
            summary: None,
            author: None,
            categories: BTreeSet::new(),
        });
        BookHandle(self.books.len() - 1)
    }

    pub fn set_summary(&mut self, book: BookHandle, summary: impl Into<String>) -> DraftResult<()> {
        self.book_mut(book)?.summary = Some(summary.into());
        Ok(())
    }

    pub fn add_category(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
    ) -> CategoryHandle {
        self.categories.push(DraftCategory {
            name: name.into(),
            description,
            books: BTreeSet::new(),
        });
        CategoryHandle(self.categories.len() - 1)
    }

    /// Makes `author` the owner of `book`, updating both sides.
    ///
    /// A book already owned by another author is moved.
    pub fn link_author_book(&mut self, author: AuthorHandle, book: BookHandle) -> DraftResult<()> {
        self.author(author)?;
        let previous = self.book(book)?.author;
        if previous == Some(author) {
            return Ok(());
        }
        if let Some(previous) = previous {
            self.authors[previous.0].books.retain(|owned| *owned != book);
        }

        self.authors[author.0].books.push(book);
        self.books[book.0].author = Some(author);
        Ok(())
    }

    /// Detaches `book` from `author` on both sides.
    ///
    /// Returns `false` when the book was not owned by that author.
    pub fn unlink_author_book(
        &mut self,
        author: AuthorHandle,
        book: BookHandle,
    ) -> DraftResult<bool> {
        self.author(author)?;
        if self.book(book)?.author != Some(author) {
            return Ok(false);
        }

        self.authors[author.0].books.retain(|owned| *owned != book);
        self.books[book.0].author = None;
        Ok(true)
    }

    /// Adds `category` to `book` and `book` to `category`.
    pub fn link_book_category(
        &mut self,
        book: BookHandle,
        category: CategoryHandle,
    ) -> DraftResult<()> {
        self.book(book)?;
        self.category(category)?;
        self.books[book.0].categories.insert(category);
        self.categories[category.0].books.insert(book);
        Ok(())
    }

    /// Drops the membership on both sides. Never removes the category itself.
    pub fn unlink_book_category(
        &mut self,
        book: BookHandle,
        category: CategoryHandle,
    ) -> DraftResult<bool> {
        self.book(book)?;
        self.category(category)?;
        let removed = self.books[book.0].categories.remove(&category);
        self.categories[category.0].books.remove(&book);
        Ok(removed)
    }

    pub fn author(&self, handle: AuthorHandle) -> DraftResult<&DraftAuthor> {
        self.authors.get(handle.0).ok_or(DraftError::UnknownHandle {
            kind: EntityKind::Author,
            index: handle.0,
        })
    }

    pub fn book(&self, handle: BookHandle) -> DraftResult<&DraftBook> {
        self.books.get(handle.0).ok_or(DraftError::UnknownHandle {
            kind: EntityKind::Book,
            index: handle.0,
        })
    }

    pub fn category(&self, handle: CategoryHandle) -> DraftResult<&DraftCategory> {
        self.categories.get(handle.0).ok_or(DraftError::UnknownHandle {
            kind: EntityKind::Category,
            index: handle.0,
        })
    }

    pub fn authors(&self) -> impl Iterator<Item = (AuthorHandle, &DraftAuthor)> {
        self.authors
            .iter()
            .enumerate()
            .map(|(index, author)| (AuthorHandle(index), author))
    }

    pub fn books(&self) -> impl Iterator<Item = (BookHandle, &DraftBook)> {
        self.books
            .iter()
            .enumerate()
            .map(|(index, book)| (BookHandle(index), book))
    }

    pub fn categories(&self) -> impl Iterator<Item = (CategoryHandle, &DraftCategory)> {
        self.categories
            .iter()
            .enumerate()
            .map(|(index, category)| (CategoryHandle(index), category))
    }

    /// Checks required fields, length limits and uniqueness inside the draft.
    ///
    /// Uniqueness against rows already persisted is left to the store.
    pub fn validate(&self) -> DraftResult<()> {
        let mut emails = HashSet::new();
        for author in &self.authors {
            require_text(EntityKind::Author, "first_name", &author.first_name)?;
            require_text(EntityKind::Author, "last_name", &author.last_name)?;
            require_text(EntityKind::Author, "email", &author.email)?;
            require_unique(&mut emails, EntityKind::Author, "email", &author.email)?;
        }

        let mut isbns = HashSet::new();
        for book in &self.books {
            require_text(EntityKind::Book, "title", &book.title)?;
            if let Some(isbn) = book.isbn.as_deref() {
                require_text(EntityKind::Book, "isbn", isbn)?;
                require_unique(&mut isbns, EntityKind::Book, "isbn", isbn)?;
            }
            if let Some(summary) = book.summary.as_deref() {
                require_max_chars(EntityKind::Book, "summary", summary, SUMMARY_MAX_CHARS)?;
            }
        }

        let mut names = HashSet::new();
        for category in &self.categories {
            require_text(EntityKind::Category, "name", &category.name)?;
            require_unique(&mut names, EntityKind::Category, "name", &category.name)?;
            if let Some(description) = category.description.as_deref() {
                require_max_chars(
                    EntityKind::Category,
                    "description",
                    description,
                    DESCRIPTION_MAX_CHARS,
                )?;
            }
        }

        Ok(())
    }

    fn book_mut(&mut self, handle: BookHandle) -> DraftResult<&mut DraftBook> {
        self.books.get_mut(handle.0).ok_or(DraftError::UnknownHandle {
            kind: EntityKind::Book,
            index: handle.0,
        })
    }
}

fn require_text(kind: EntityKind, field: &'static str, value: &str) -> DraftResult<()> {
    if value.trim().is_empty() {
        return Err(DraftError::BlankField { kind, field });
    }
    Ok(())
}

fn require_max_chars(
    kind: EntityKind,
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> DraftResult<()> {
    if value.chars().count() > max_chars {
        return Err(DraftError::FieldTooLong {
            kind,
            field,
            max_chars,
        });
    }
    Ok(())
}

fn require_unique<'a>(
    seen: &mut HashSet<&'a str>,
    kind: EntityKind,
    field: &'static str,
    value: &'a str,
) -> DraftResult<()> {
    if !seen.insert(value) {
        return Err(DraftError::Duplicate {
            kind,
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
