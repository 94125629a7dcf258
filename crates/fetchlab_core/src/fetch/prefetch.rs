//! Prefetch specifications for the eager-graph strategy.
//!
//! A spec is plain data: a name plus the relation paths to resolve in the
//! same round trip as the roots. It is checked against the root kind each
//! time it is used.

use super::RootKind;
use crate::cache::{AccessError, AccessResult};
use crate::model::{EntityKind, Relation};
use serde::Serialize;

/// Relation paths to load together with the roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefetchSpec {
    name: String,
    paths: Vec<Vec<Relation>>,
}

/// Which relationships a root query resolves from joined rows.
///
/// `book_categories` covers the categories of every book in the graph,
/// whether the books are the roots or nested under authors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Includes {
    pub author_books: bool,
    pub book_author: bool,
    pub book_categories: bool,
}

impl Includes {
    /// Nothing joined; every relationship is resolved lazily.
    pub fn none() -> Self {
        Self::default()
    }

    /// Only the root's direct relationship.
    pub fn direct(root: RootKind) -> Self {
        match root {
            RootKind::Authors => Self {
                author_books: true,
                ..Self::default()
            },
            RootKind::Books => Self {
                book_author: true,
                ..Self::default()
            },
        }
    }
}

impl PrefetchSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            paths: Vec::new(),
        }
    }

    /// Adds one path, e.g. `[AuthorBooks, BookCategories]`.
    pub fn include(mut self, path: &[Relation]) -> Self {
        self.paths.push(path.to_vec());
        self
    }

    /// Book -> author and book -> categories.
    pub fn book_categories_and_author() -> Self {
        Self::named("graph.book.categories_and_author")
            .include(&[Relation::BookCategories])
            .include(&[Relation::BookAuthor])
    }

    /// Author -> books -> categories.
    pub fn author_books_and_categories() -> Self {
        Self::named("graph.author.books_and_categories")
            .include(&[Relation::AuthorBooks, Relation::BookCategories])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn paths(&self) -> &[Vec<Relation>] {
        &self.paths
    }

    /// Validates every path against `root` and folds them into `Includes`.
    ///
    /// # Errors
    /// - `InvalidPrefetch` for an empty path, a relation whose source does not
    ///   match the previous step, or a path that revisits an entity kind.
    pub fn resolve(&self, root: RootKind) -> AccessResult<Includes> {
        let mut includes = Includes::none();
        for path in &self.paths {
            if path.is_empty() {
                return Err(self.invalid("empty relation path".to_string()));
            }

            let mut current = root.kind();
            let mut visited: Vec<EntityKind> = vec![current];
            for relation in path {
                if relation.source() != current {
                    return Err(self.invalid(format!(
                        "relation {relation} cannot follow {current} in path {}",
                        describe(path)
                    )));
                }
                current = relation.target();
                if visited.contains(&current) {
                    return Err(self.invalid(format!(
                        "path {} revisits {current}",
                        describe(path)
                    )));
                }
                visited.push(current);

                match relation {
                    Relation::AuthorBooks => includes.author_books = true,
                    Relation::BookAuthor => includes.book_author = true,
                    Relation::BookCategories => includes.book_categories = true,
                }
            }
        }
        Ok(includes)
    }

    fn invalid(&self, message: String) -> AccessError {
        AccessError::InvalidPrefetch(format!("{}: {message}", self.name))
    }
}

fn describe(path: &[Relation]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
