//! Column aliases and row decoders shared by every library query.
//!
//! Each entity is selected under a fixed alias prefix (`author_`, `book_`,
//! `category_`) so one decoder handles plain, joined and by-id rows alike.
//! Table aliases are fixed as well: `a` authors, `b` books, `bc`
//! book_categories, `c` categories.

use super::{StoreError, StoreResult, StoreRow};
use crate::model::{Author, Book, Category, Entity, EntityKind};

pub const AUTHOR_COLUMNS: &str = "a.id AS author_id,
    a.first_name AS author_first_name,
    a.last_name AS author_last_name,
    a.email AS author_email";

pub const BOOK_COLUMNS: &str = "b.id AS book_id,
    b.title AS book_title,
    b.publication_year AS book_publication_year,
    b.isbn AS book_isbn,
    b.summary AS book_summary,
    b.author_id AS book_author_id";

/// Category columns plus the membership row's category id, which stays set
/// even when the category row itself is missing.
pub const CATEGORY_COLUMNS: &str = "bc.category_id AS link_category_id,
    c.id AS category_id,
    c.name AS category_name,
    c.description AS category_description";

const CATEGORY_ENTITY_COLUMNS: &str = "c.id AS category_id,
    c.name AS category_name,
    c.description AS category_description";

/// Select statement loading one record of `kind` by primary key (`?1`).
pub fn select_by_id_sql(kind: EntityKind) -> String {
    match kind {
        EntityKind::Author => format!("SELECT {AUTHOR_COLUMNS} FROM authors a WHERE a.id = ?1"),
        EntityKind::Book => format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = ?1"),
        EntityKind::Category => {
            format!("SELECT {CATEGORY_ENTITY_COLUMNS} FROM categories c WHERE c.id = ?1")
        }
    }
}

/// Decodes the author columns; `None` when they were not selected or the
/// outer join produced no author.
pub fn decode_author(row: &StoreRow) -> StoreResult<Option<Author>> {
    if !row.contains("author_id") {
        return Ok(None);
    }
    let Some(id) = row.opt_i64("author_id")? else {
        return Ok(None);
    };

    Ok(Some(Author {
        id,
        first_name: row.text("author_first_name")?,
        last_name: row.text("author_last_name")?,
        email: row.text("author_email")?,
    }))
}

pub fn decode_book(row: &StoreRow) -> StoreResult<Option<Book>> {
    if !row.contains("book_id") {
        return Ok(None);
    }
    let Some(id) = row.opt_i64("book_id")? else {
        return Ok(None);
    };

    let publication_year = match row.opt_i64("book_publication_year")? {
        Some(year) => Some(i32::try_from(year).map_err(|_| {
            StoreError::InvalidData(format!(
                "invalid publication year `{year}` in books.publication_year"
            ))
        })?),
        None => None,
    };

    Ok(Some(Book {
        id,
        title: row.text("book_title")?,
        publication_year,
        isbn: row.opt_text("book_isbn")?,
        summary: row.opt_text("book_summary")?,
        author_id: row.opt_i64("book_author_id")?,
    }))
}

pub fn decode_category(row: &StoreRow) -> StoreResult<Option<Category>> {
    if !row.contains("category_id") {
        return Ok(None);
    }
    let Some(id) = row.opt_i64("category_id")? else {
        return Ok(None);
    };

    Ok(Some(Category {
        id,
        name: row.text("category_name")?,
        description: row.opt_text("category_description")?,
    }))
}

/// Decodes a by-id row into the entity of `kind`.
pub fn decode_entity(kind: EntityKind, row: &StoreRow) -> StoreResult<Entity> {
    let entity = match kind {
        EntityKind::Author => decode_author(row)?.map(Entity::Author),
        EntityKind::Book => decode_book(row)?.map(Entity::Book),
        EntityKind::Category => decode_category(row)?.map(Entity::Category),
    };
    entity.ok_or_else(|| StoreError::InvalidData(format!("row carries no {kind} columns")))
}
