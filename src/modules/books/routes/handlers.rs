use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{
        header::{CONTENT_TYPE, LOCATION},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use bookshelf_authz::{require_role, Caller, Role};
use bookshelf_http::{versioning::RequestedVersion, AppError};

use crate::modules::books::models::{Book, BookPayload, GET_BOOKS};
use crate::modules::books::{BooksState, BOOKS_CACHE_TAG};
use crate::serializer::{deserialize, serialize, serialize_all, SerializationContext};
use crate::validation::Validate;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 3;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub(super) struct Pagination {
    page: Option<u32>,
    limit: Option<u32>,
}

impl Pagination {
    fn resolve(&self) -> Result<(u32, u32), AppError> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if page < 1 || limit < 1 {
            return Err(AppError::bad_request(
                "page and limit must be positive integers",
            ));
        }
        Ok((page, limit.min(MAX_LIMIT)))
    }
}

/// Cache key for one page of the book list.
pub(super) fn list_cache_key(page: u32, limit: u32) -> String {
    format!("getAllBooks-{page}-{limit}")
}

fn json(status: StatusCode, body: Bytes) -> Response {
    (
        status,
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}

fn book_context(version: RequestedVersion) -> SerializationContext {
    SerializationContext::with_groups(&[GET_BOOKS]).version(version.0)
}

async fn attach_author(
    state: &BooksState,
    book: &mut Book,
    payload: &BookPayload,
) -> Result<(), AppError> {
    let author_id = payload.author_id();
    book.author = state.authors.find_by_id(author_id).await?;
    if book.author.is_none() && author_id != -1 {
        tracing::debug!(author_id, "author not found; leaving book without author");
    }
    Ok(())
}

fn ensure_valid(book: &Book) -> Result<(), AppError> {
    let violations = book.validate();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(violations))
    }
}

/// GET /api/books?page&limit
pub(super) async fn list_books(
    State(state): State<BooksState>,
    query: Result<Query<Pagination>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(pagination) = query?;
    let (page, limit) = pagination.resolve()?;
    let cache_key = list_cache_key(page, limit);

    let body = state
        .cache
        .get_or_compute(&cache_key, BOOKS_CACHE_TAG, || async {
            let books = state.books.list_books(page, limit).await?;
            let context = SerializationContext::with_groups(&[GET_BOOKS]);
            serialize_all(&books, &context).map_err(AppError::from)
        })
        .await?;

    Ok(json(StatusCode::OK, body))
}

/// GET /api/books/clearCache
pub(super) async fn clear_cache(
    State(state): State<BooksState>,
    caller: Caller,
) -> Result<Json<&'static str>, AppError> {
    require_role(
        &caller,
        Role::Admin,
        "You do not have sufficient rights to clear the cache",
    )?;

    state.cache.invalidate_tag(BOOKS_CACHE_TAG);
    Ok(Json("Cache cleared"))
}

/// GET /api/books/{id}
pub(super) async fn get_book(
    State(state): State<BooksState>,
    path: Result<Path<i64>, PathRejection>,
    version: RequestedVersion,
) -> Result<Response, AppError> {
    let Path(id) = path?;
    let book = state.books.get_book_by_id(id).await?;

    let body = serialize(&book, &book_context(version))?;
    Ok(json(StatusCode::OK, body))
}

/// POST /api/books
pub(super) async fn create_book(
    State(state): State<BooksState>,
    caller: Caller,
    version: RequestedVersion,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    require_role(
        &caller,
        Role::Admin,
        "You do not have sufficient rights to create a book",
    )?;

    let payload: BookPayload = deserialize(&body?)?;
    let mut book = payload.to_book();
    ensure_valid(&book)?;

    attach_author(&state, &mut book, &payload).await?;
    let id = state.books.insert(&mut book).await?;

    state.cache.invalidate_tag(BOOKS_CACHE_TAG);
    tracing::info!(book_id = id, subject = caller.subject(), "book created");

    let body = serialize(&book, &book_context(version))?;
    let location = HeaderValue::try_from(state.detail_url(id))
        .map_err(|err| AppError::Internal(err.into()))?;

    let mut response = json(StatusCode::CREATED, body);
    response.headers_mut().insert(LOCATION, location);
    Ok(response)
}

/// PUT /api/books/{id}
pub(super) async fn update_book(
    State(state): State<BooksState>,
    caller: Caller,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, AppError> {
    require_role(
        &caller,
        Role::Admin,
        "You do not have sufficient rights to edit a book",
    )?;

    let Path(id) = path?;
    let mut current = state.books.get_book_by_id(id).await?;

    let payload: BookPayload = deserialize(&body?)?;
    payload.apply_to(&mut current);
    ensure_valid(&current)?;

    attach_author(&state, &mut current, &payload).await?;
    state.books.update(&current).await?;

    state.cache.invalidate_tag(BOOKS_CACHE_TAG);
    tracing::info!(book_id = id, subject = caller.subject(), "book updated");

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/books/{id}
pub(super) async fn delete_book(
    State(state): State<BooksState>,
    caller: Caller,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    require_role(
        &caller,
        Role::Admin,
        "You do not have sufficient rights to delete a book",
    )?;

    let Path(id) = path?;
    if !state.books.delete(id).await? {
        return Err(AppError::not_found(format!("Book {id} not found")));
    }

    state.cache.invalidate_tag(BOOKS_CACHE_TAG);
    tracing::info!(book_id = id, subject = caller.subject(), "book deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        let pagination = Pagination {
            page: None,
            limit: None,
        };
        assert_eq!(pagination.resolve().unwrap(), (1, 3));
    }

    #[test]
    fn pagination_rejects_zero_and_caps_limit() {
        let zero = Pagination {
            page: Some(0),
            limit: Some(3),
        };
        assert!(matches!(zero.resolve(), Err(AppError::BadRequest(_))));

        let huge = Pagination {
            page: Some(2),
            limit: Some(10_000),
        };
        assert_eq!(huge.resolve().unwrap(), (2, MAX_LIMIT));
    }

    #[test]
    fn cache_keys_do_not_collide() {
        assert_eq!(list_cache_key(1, 3), "getAllBooks-1-3");
        assert_ne!(list_cache_key(1, 23), list_cache_key(12, 3));
    }
}
