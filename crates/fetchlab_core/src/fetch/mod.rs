//! Fetch-strategy engine: materializes author and book graphs.
//!
//! # Responsibility
//! - Run the root query for the selected strategy through the cache layer.
//! - Resolve every relationship the root query did not join, one query per
//!   owner, so all strategies yield the same graph.
//!
//! # Invariants
//! - Store access goes through `CacheLayer` only.
//! - `Lazy` joins nothing, `EagerJoin` joins the root's direct relationship,
//!   `EagerGraph` joins what its `PrefetchSpec` declares.
//! - Prefetch specs are validated before any query runs.
//! - A reference to a missing record fails with `AccessError::Integrity`.

pub mod plan;
pub mod prefetch;

pub use prefetch::{Includes, PrefetchSpec};

use crate::cache::{AccessError, AccessResult, CacheLayer, QuerySignature, ResultRow};
use crate::model::{
    Author, AuthorGraph, AuthorId, Book, BookEntry, BookGraph, BookId, Category, EntityKind,
};
use crate::store::{QueryParam, RelationalStore, StoreError};
use log::info;
use plan::{root_query, AUTHORS_BY_LAST_NAME_SQL, BOOKS_BY_AUTHOR_SQL, CATEGORIES_BY_BOOK_SQL};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Entity kind a root query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootKind {
    Authors,
    Books,
}

impl RootKind {
    pub fn kind(self) -> EntityKind {
        match self {
            Self::Authors => EntityKind::Author,
            Self::Books => EntityKind::Book,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authors => "authors",
            Self::Books => "books",
        }
    }

    fn table(self) -> &'static str {
        match self {
            Self::Authors => "authors a",
            Self::Books => "books b",
        }
    }
}

impl Display for RootKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How relationships of the roots are loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Roots only; each relationship costs one query per owner.
    Lazy,
    /// Roots plus their direct relationship in one outer-join query.
    EagerJoin,
    /// Roots plus every declared path in one query.
    EagerGraph(PrefetchSpec),
}

impl FetchStrategy {
    pub fn name(&self) -> &str {
        match self {
            Self::Lazy => "lazy",
            Self::EagerJoin => "eager_join",
            Self::EagerGraph(_) => "eager_graph",
        }
    }

    /// Relationships the root query joins for `root`.
    ///
    /// # Errors
    /// - `InvalidPrefetch` when an eager-graph spec does not fit `root`.
    pub fn includes(&self, root: RootKind) -> AccessResult<Includes> {
        match self {
            Self::Lazy => Ok(Includes::none()),
            Self::EagerJoin => Ok(Includes::direct(root)),
            Self::EagerGraph(spec) => spec.resolve(root),
        }
    }
}

/// Graphs produced by one root load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "root", content = "graphs", rename_all = "snake_case")]
pub enum LoadedGraph {
    Authors(Vec<AuthorGraph>),
    Books(Vec<BookGraph>),
}

impl LoadedGraph {
    pub fn root_count(&self) -> usize {
        match self {
            Self::Authors(graphs) => graphs.len(),
            Self::Books(graphs) => graphs.len(),
        }
    }
}

/// Strategy-aware loader on top of one cache layer.
pub struct FetchEngine<'a, S> {
    layer: &'a CacheLayer<'a, S>,
}

impl<'a, S: RelationalStore> FetchEngine<'a, S> {
    pub fn new(layer: &'a CacheLayer<'a, S>) -> Self {
        Self { layer }
    }

    pub fn layer(&self) -> &CacheLayer<'a, S> {
        self.layer
    }

    /// Loads every root of `root` with `strategy`.
    pub fn load(&self, root: RootKind, strategy: &FetchStrategy) -> AccessResult<LoadedGraph> {
        match root {
            RootKind::Authors => self.load_authors(strategy).map(LoadedGraph::Authors),
            RootKind::Books => self.load_books(strategy).map(LoadedGraph::Books),
        }
    }

    /// Loads every author with books and each book's categories.
    ///
    /// # Errors
    /// - `InvalidPrefetch` when the strategy's spec does not fit author roots.
    /// - `Integrity` when a membership points at a missing category.
    pub fn load_authors(&self, strategy: &FetchStrategy) -> AccessResult<Vec<AuthorGraph>> {
        let started_at = Instant::now();
        let includes = strategy.includes(RootKind::Authors)?;
        let rows = self.root_rows(RootKind::Authors, includes)?;

        let mut graphs: Vec<AuthorGraph> = Vec::new();
        let mut positions: HashMap<AuthorId, usize> = HashMap::new();
        for row in rows {
            let author = row
                .author
                .ok_or_else(|| missing_root_columns(RootKind::Authors))?;
            let index = *positions.entry(author.id).or_insert_with(|| {
                graphs.push(AuthorGraph {
                    author,
                    books: Vec::new(),
                });
                graphs.len() - 1
            });

            if !includes.author_books {
                continue;
            }
            let Some(book) = row.book else {
                continue;
            };
            let books = &mut graphs[index].books;
            // Joined rows arrive ordered by book id within each author.
            if books.last().map(|entry| entry.book.id) != Some(book.id) {
                books.push(BookEntry {
                    book,
                    categories: Vec::new(),
                });
            }
            if includes.book_categories {
                if let (Some(category), Some(entry)) = (row.category, books.last_mut()) {
                    push_category(&mut entry.categories, category);
                }
            }
        }

        for graph in &mut graphs {
            if !includes.author_books {
                graph.books = self
                    .resolve_books(&graph.author)?
                    .into_iter()
                    .map(|book| BookEntry {
                        book,
                        categories: Vec::new(),
                    })
                    .collect();
            }
            if !includes.book_categories {
                for entry in &mut graph.books {
                    entry.categories = self.resolve_categories(&entry.book)?;
                }
            }
        }

        log_fetch(RootKind::Authors, strategy, graphs.len(), started_at);
        Ok(graphs)
    }

    /// Loads every book with its author and categories.
    ///
    /// # Errors
    /// - `InvalidPrefetch` when the strategy's spec does not fit book roots.
    /// - `Integrity` when a book references a missing author or category.
    pub fn load_books(&self, strategy: &FetchStrategy) -> AccessResult<Vec<BookGraph>> {
        let started_at = Instant::now();
        let includes = strategy.includes(RootKind::Books)?;
        let rows = self.root_rows(RootKind::Books, includes)?;

        let mut graphs: Vec<BookGraph> = Vec::new();
        let mut positions: HashMap<BookId, usize> = HashMap::new();
        for row in rows {
            let book = row
                .book
                .ok_or_else(|| missing_root_columns(RootKind::Books))?;
            let index = *positions.entry(book.id).or_insert_with(|| {
                graphs.push(BookGraph {
                    book,
                    author: None,
                    categories: Vec::new(),
                });
                graphs.len() - 1
            });

            let graph = &mut graphs[index];
            if includes.book_author && graph.author.is_none() {
                graph.author = row.author;
            }
            if includes.book_categories {
                if let Some(category) = row.category {
                    push_category(&mut graph.categories, category);
                }
            }
        }

        for graph in &mut graphs {
            if !includes.book_author {
                graph.author = self.resolve_author(&graph.book)?;
            }
            if !includes.book_categories {
                graph.categories = self.resolve_categories(&graph.book)?;
            }
        }

        log_fetch(RootKind::Books, strategy, graphs.len(), started_at);
        Ok(graphs)
    }

    /// Books owned by `author`, ordered by id. One query unless cached.
    pub fn resolve_books(&self, author: &Author) -> AccessResult<Vec<Book>> {
        let signature = QuerySignature::new(&BOOKS_BY_AUTHOR_SQL, vec![author.id.into()]);
        self.layer
            .get_query_result(&signature)?
            .into_iter()
            .map(|row| row.book.ok_or_else(|| missing_columns("book", &signature)))
            .collect()
    }

    /// Categories of `book`, ordered by id. One query unless cached.
    ///
    /// # Errors
    /// - `Integrity` when a membership row points at a missing category.
    pub fn resolve_categories(&self, book: &Book) -> AccessResult<Vec<Category>> {
        let signature = QuerySignature::new(&CATEGORIES_BY_BOOK_SQL, vec![book.id.into()]);
        self.layer
            .get_query_result(&signature)?
            .into_iter()
            .map(|row| {
                row.category
                    .ok_or_else(|| missing_columns("category", &signature))
            })
            .collect()
    }

    /// Author of `book` through the entity cache; `None` when unset.
    ///
    /// # Errors
    /// - `Integrity` when `book.author_id` names a missing author.
    pub fn resolve_author(&self, book: &Book) -> AccessResult<Option<Author>> {
        let Some(author_id) = book.author_id else {
            return Ok(None);
        };
        self.layer
            .get_author(author_id)
            .map(Some)
            .map_err(|err| err.into_dangling(format!("book {} author", book.id)))
    }

    /// One author by id through the entity cache.
    ///
    /// # Errors
    /// - `NotFound` when no author has `id`.
    pub fn find_author(&self, id: AuthorId) -> AccessResult<Author> {
        self.layer.get_author(id)
    }

    /// Authors with exactly `last_name`, through the query cache.
    pub fn authors_by_last_name(&self, last_name: &str) -> AccessResult<Vec<Author>> {
        let signature =
            QuerySignature::new(&AUTHORS_BY_LAST_NAME_SQL, vec![QueryParam::from(last_name)]);
        self.layer
            .get_query_result(&signature)?
            .into_iter()
            .map(|row| row.author.ok_or_else(|| missing_columns("author", &signature)))
            .collect()
    }

    fn root_rows(&self, root: RootKind, includes: Includes) -> AccessResult<Vec<ResultRow>> {
        let signature = QuerySignature::new(&root_query(root, includes), Vec::new());
        self.layer.get_query_result(&signature)
    }
}

/// Appends `category` unless the previous joined row already carried it.
fn push_category(categories: &mut Vec<Category>, category: Category) {
    if categories.last().map(|last| last.id) != Some(category.id) {
        categories.push(category);
    }
}

fn missing_root_columns(root: RootKind) -> AccessError {
    AccessError::Store(StoreError::InvalidData(format!(
        "root query for {root} returned a row without root columns"
    )))
}

fn missing_columns(what: &str, signature: &QuerySignature) -> AccessError {
    AccessError::Store(StoreError::InvalidData(format!(
        "query returned a row without {what} columns: {signature}"
    )))
}

fn log_fetch(root: RootKind, strategy: &FetchStrategy, roots: usize, started_at: Instant) {
    let (prefetch, paths) = match strategy {
        FetchStrategy::EagerGraph(spec) => (spec.name(), spec.paths().len()),
        _ => ("none", 0),
    };
    info!(
        "event=fetch module=fetch status=ok root={} strategy={} prefetch={} paths={} roots={} duration_ms={}",
        root,
        strategy.name(),
        prefetch,
        paths,
        roots,
        started_at.elapsed().as_millis()
    );
}
