use anyhow::Context;

use super::models::Book;
use super::repository::{AuthorRepository, BookRepository};

const AUTHOR_COUNT: usize = 10;
const BOOK_COUNT: usize = 20;

/// Fill an empty catalog with demo authors and books.
///
/// Books are spread over the authors round-robin, so book `i` belongs to
/// author `i % 10`. Does nothing when books already exist.
pub async fn seed(books: &BookRepository, authors: &AuthorRepository) -> anyhow::Result<usize> {
    if !books.list_books(1, 1).await?.is_empty() {
        tracing::info!(module = "books", "catalog already populated; skipping seed");
        return Ok(0);
    }

    let mut created_authors = Vec::with_capacity(AUTHOR_COUNT);
    for i in 0..AUTHOR_COUNT {
        let author = authors
            .insert(&format!("First name {i}"), &format!("Last name {i}"))
            .await
            .with_context(|| format!("failed to seed author {i}"))?;
        created_authors.push(author);
    }

    for i in 0..BOOK_COUNT {
        let mut book = Book {
            id: None,
            title: format!("Title {i}"),
            cover_text: format!("Back cover number: {i}"),
            comment: Some(format!("Librarian's note {i}")),
            author: Some(created_authors[i % AUTHOR_COUNT].clone()),
        };
        books
            .insert(&mut book)
            .await
            .with_context(|| format!("failed to seed book {i}"))?;
    }

    tracing::info!(
        module = "books",
        authors = AUTHOR_COUNT,
        books = BOOK_COUNT,
        "seeded catalog"
    );
    Ok(BOOK_COUNT)
}
