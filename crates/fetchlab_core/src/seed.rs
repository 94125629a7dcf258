//! Sample library used by the benchmark scenarios.
//!
//! Four authors own 2, 2, 2 and 20 books; every book belongs to exactly one
//! category and the fifth category stays empty.

use crate::model::library::{AuthorHandle, CategoryHandle, DraftResult, LibraryDraft};

pub const CHRISTIE_BOOK_COUNT: i32 = 20;

struct SampleBook {
    title: &'static str,
    year: i32,
    isbn: &'static str,
    summary: &'static str,
}

/// Builds the sample library draft. Persist it with `SqliteStore::seed`.
pub fn sample_library() -> DraftResult<LibraryDraft> {
    let mut draft = LibraryDraft::new();

    let roman = draft.add_category("Roman", Some("Œuvres de fiction narrative".to_string()));
    let science_fiction = draft.add_category(
        "Science-Fiction",
        Some("Œuvres spéculatives basées sur des innovations scientifiques".to_string()),
    );
    let fantasy = draft.add_category(
        "Fantasy",
        Some("Œuvres mettant en scène un univers imaginaire".to_string()),
    );
    let policier = draft.add_category(
        "Policier",
        Some("Œuvres centrées sur la résolution d'une enquête".to_string()),
    );
    draft.add_category(
        "Biographie",
        Some("Récits de vie de personnalités".to_string()),
    );

    let hugo = draft.add_author("Victor", "Hugo", "victor.hugo@example.com");
    add_books(
        &mut draft,
        hugo,
        roman,
        &[
            SampleBook {
                title: "Les Misérables",
                year: 1862,
                isbn: "9782253096344",
                summary: "L'histoire de Jean Valjean, un ancien forçat qui tente de se racheter.",
            },
            SampleBook {
                title: "Notre-Dame de Paris",
                year: 1831,
                isbn: "9782253096337",
                summary: "L'histoire de Quasimodo, le sonneur de cloches bossu de Notre-Dame.",
            },
        ],
    )?;

    let asimov = draft.add_author("Isaac", "Asimov", "isaac.asimov@example.com");
    add_books(
        &mut draft,
        asimov,
        science_fiction,
        &[
            SampleBook {
                title: "Fondation",
                year: 1951,
                isbn: "9782070415700",
                summary: "L'histoire de la Fondation, créée pour préserver la civilisation galactique.",
            },
            SampleBook {
                title: "Les Robots",
                year: 1950,
                isbn: "9782290055120",
                summary: "Recueil de nouvelles sur les robots et les Trois Lois de la robotique.",
            },
        ],
    )?;

    let tolkien = draft.add_author("J.R.R.", "Tolkien", "jrr.tolkien@example.com");
    add_books(
        &mut draft,
        tolkien,
        fantasy,
        &[
            SampleBook {
                title: "Le Seigneur des Anneaux",
                year: 1954,
                isbn: "9782070612888",
                summary: "L'épopée de Frodon Sacquet pour détruire l'Anneau Unique.",
            },
            SampleBook {
                title: "Le Hobbit",
                year: 1937,
                isbn: "9782075134156",
                summary: "Les aventures de Bilbon Sacquet, recruté par le magicien Gandalf.",
            },
        ],
    )?;

    let christie = draft.add_author("Agatha", "Christie", "agatha.christie@example.com");
    for n in 1..=CHRISTIE_BOOK_COUNT {
        let book = draft.add_book(
            format!("Mystère {n}"),
            Some(1920 + n),
            Some(format!("978020000000{n}")),
        );
        draft.set_summary(book, "Un mystère à résoudre par Hercule Poirot ou Miss Marple.")?;
        draft.link_book_category(book, policier)?;
        draft.link_author_book(christie, book)?;
    }

    Ok(draft)
}

fn add_books(
    draft: &mut LibraryDraft,
    author: AuthorHandle,
    category: CategoryHandle,
    books: &[SampleBook],
) -> DraftResult<()> {
    for sample in books {
        let book = draft.add_book(sample.title, Some(sample.year), Some(sample.isbn.to_string()));
        draft.set_summary(book, sample.summary)?;
        draft.link_book_category(book, category)?;
        draft.link_author_book(author, book)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::sample_library;

    #[test]
    fn sample_library_is_valid_and_shaped_as_expected() {
        let draft = sample_library().unwrap();
        draft.validate().unwrap();

        let counts: Vec<usize> = draft.authors().map(|(_, author)| author.books().len()).collect();
        assert_eq!(counts, vec![2, 2, 2, 20]);
        assert_eq!(draft.categories().count(), 5);
        assert!(draft.books().all(|(_, book)| book.categories().count() == 1));
    }
}
