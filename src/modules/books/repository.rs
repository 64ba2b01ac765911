use anyhow::Context;
use sqlx::SqlitePool;

use bookshelf_http::AppError;

use super::models::{Author, Book};

/// Books joined with their author in a single round trip.
const SELECT_BOOKS: &str = "SELECT b.id, b.title, b.cover_text, b.comment, \
     a.id AS author_id, a.first_name AS author_first_name, a.last_name AS author_last_name \
     FROM book b \
     LEFT JOIN author a ON a.id = b.author_id";

#[derive(sqlx::FromRow)]
struct BookRow {
    id: i64,
    title: String,
    cover_text: String,
    comment: Option<String>,
    author_id: Option<i64>,
    author_first_name: Option<String>,
    author_last_name: Option<String>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        let author = match (row.author_id, row.author_first_name, row.author_last_name) {
            (Some(id), Some(first_name), Some(last_name)) => Some(Author {
                id,
                first_name,
                last_name,
            }),
            _ => None,
        };

        Self {
            id: Some(row.id),
            title: row.title,
            cover_text: row.cover_text,
            comment: row.comment,
            author,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: i64,
    first_name: String,
    last_name: String,
}

impl From<AuthorRow> for Author {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

/// Read and write access to stored books.
#[derive(Clone)]
pub struct BookRepository {
    pool: SqlitePool,
}

impl BookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// One page of books in insertion order. `page` and `limit` start at 1.
    pub async fn list_books(&self, page: u32, limit: u32) -> anyhow::Result<Vec<Book>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);

        let rows: Vec<BookRow> =
            sqlx::query_as(&format!("{SELECT_BOOKS} ORDER BY b.id ASC LIMIT ? OFFSET ?"))
                .bind(i64::from(limit))
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("failed to list books (page {page}, limit {limit})"))?;

        Ok(rows.into_iter().map(Book::from).collect())
    }

    pub async fn find_book(&self, id: i64) -> anyhow::Result<Option<Book>> {
        let row: Option<BookRow> = sqlx::query_as(&format!("{SELECT_BOOKS} WHERE b.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load book {id}"))?;

        Ok(row.map(Book::from))
    }

    /// Lookup-or-404 used at the top of handlers working on one book.
    pub async fn get_book_by_id(&self, id: i64) -> Result<Book, AppError> {
        self.find_book(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Book {id} not found")))
    }

    /// Persist a new book and record its assigned id.
    pub async fn insert(&self, book: &mut Book) -> anyhow::Result<i64> {
        let result = sqlx::query(
            "INSERT INTO book (title, cover_text, comment, author_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&book.title)
        .bind(&book.cover_text)
        .bind(&book.comment)
        .bind(book.author.as_ref().map(|author| author.id))
        .execute(&self.pool)
        .await
        .context("failed to insert book")?;

        let id = result.last_insert_rowid();
        book.id = Some(id);
        Ok(id)
    }

    pub async fn update(&self, book: &Book) -> anyhow::Result<()> {
        let id = book.id.context("cannot update a book that was never saved")?;

        sqlx::query(
            "UPDATE book SET title = ?, cover_text = ?, comment = ?, author_id = ? WHERE id = ?",
        )
        .bind(&book.title)
        .bind(&book.cover_text)
        .bind(&book.comment)
        .bind(book.author.as_ref().map(|author| author.id))
        .bind(id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update book {id}"))?;

        Ok(())
    }

    /// Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM book WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete book {id}"))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Read access to authors, plus inserts for seeding.
#[derive(Clone)]
pub struct AuthorRepository {
    pool: SqlitePool,
}

impl AuthorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// `None` for `-1` or any id without a stored author.
    pub async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Author>> {
        if id < 1 {
            return Ok(None);
        }

        let row: Option<AuthorRow> =
            sqlx::query_as("SELECT id, first_name, last_name FROM author WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("failed to load author {id}"))?;

        Ok(row.map(Author::from))
    }

    pub async fn insert(&self, first_name: &str, last_name: &str) -> anyhow::Result<Author> {
        let result = sqlx::query("INSERT INTO author (first_name, last_name) VALUES (?, ?)")
            .bind(first_name)
            .bind(last_name)
            .execute(&self.pool)
            .await
            .context("failed to insert author")?;

        Ok(Author {
            id: result.last_insert_rowid(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
    }
}
