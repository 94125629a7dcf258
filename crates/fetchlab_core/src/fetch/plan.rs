//! SQL text for root queries and lazy relationship loads.
//!
//! Every statement orders each level by primary key so all strategies
//! materialize the same graph in the same order.

use super::prefetch::Includes;
use super::RootKind;
use crate::store::rows::{AUTHOR_COLUMNS, BOOK_COLUMNS, CATEGORY_COLUMNS};
use once_cell::sync::Lazy;

pub static BOOKS_BY_AUTHOR_SQL: Lazy<String> = Lazy::new(|| {
    format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.author_id = ?1 ORDER BY b.id")
});

/// Walks the membership table so a link to a missing category still yields a
/// row the decoder can report.
pub static CATEGORIES_BY_BOOK_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {CATEGORY_COLUMNS}
         FROM book_categories bc
         LEFT JOIN categories c ON c.id = bc.category_id
         WHERE bc.book_id = ?1
         ORDER BY bc.category_id"
    )
});

pub static AUTHORS_BY_LAST_NAME_SQL: Lazy<String> = Lazy::new(|| {
    format!("SELECT {AUTHOR_COLUMNS} FROM authors a WHERE a.last_name = ?1 ORDER BY a.id")
});

/// Builds the root query for `root`, joining exactly what `includes` asks for.
pub fn root_query(root: RootKind, includes: Includes) -> String {
    let mut columns = Vec::new();
    let mut joins = Vec::new();
    let mut order = Vec::new();

    match root {
        RootKind::Authors => {
            columns.push(AUTHOR_COLUMNS);
            order.push("a.id");
            if includes.author_books {
                columns.push(BOOK_COLUMNS);
                joins.push("LEFT JOIN books b ON b.author_id = a.id");
                order.push("b.id");
                if includes.book_categories {
                    columns.push(CATEGORY_COLUMNS);
                    joins.push("LEFT JOIN book_categories bc ON bc.book_id = b.id");
                    joins.push("LEFT JOIN categories c ON c.id = bc.category_id");
                    order.push("bc.category_id");
                }
            }
        }
        RootKind::Books => {
            columns.push(BOOK_COLUMNS);
            order.push("b.id");
            if includes.book_author {
                columns.push(AUTHOR_COLUMNS);
                joins.push("LEFT JOIN authors a ON a.id = b.author_id");
            }
            if includes.book_categories {
                columns.push(CATEGORY_COLUMNS);
                joins.push("LEFT JOIN book_categories bc ON bc.book_id = b.id");
                joins.push("LEFT JOIN categories c ON c.id = bc.category_id");
                order.push("bc.category_id");
            }
        }
    }

    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), root.table());
    for join in joins {
        sql.push(' ');
        sql.push_str(join);
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(&order.join(", "));
    sql
}

#[cfg(test)]
mod tests {
    use super::root_query;
    use crate::fetch::prefetch::Includes;
    use crate::fetch::RootKind;

    #[test]
    fn lazy_root_query_has_no_joins() {
        let sql = root_query(RootKind::Authors, Includes::none());
        assert!(!sql.contains("JOIN"));
        assert!(sql.ends_with("ORDER BY a.id"));
    }

    #[test]
    fn book_graph_joins_author_and_categories() {
        let includes = Includes {
            author_books: false,
            book_author: true,
            book_categories: true,
        };
        let sql = root_query(RootKind::Books, includes);
        assert!(sql.contains("LEFT JOIN authors a ON a.id = b.author_id"));
        assert!(sql.contains("LEFT JOIN categories c ON c.id = bc.category_id"));
        assert!(sql.ends_with("ORDER BY b.id, bc.category_id"));
    }

    #[test]
    fn author_categories_require_the_books_join() {
        let includes = Includes {
            author_books: false,
            book_author: false,
            book_categories: true,
        };
        assert!(!root_query(RootKind::Authors, includes).contains("book_categories"));
    }
}
