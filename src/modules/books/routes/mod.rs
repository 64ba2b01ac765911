//! Route table for the books module.

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use super::BooksState;

/// Routes mounted under `/api/books`.
///
/// `/clearCache` is a static segment, so it wins over `/{id}`.
pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", post(handlers::create_book).get(handlers::list_books))
        .route("/clearCache", get(handlers::clear_cache))
        .route(
            "/{id}",
            get(handlers::get_book)
                .put(handlers::update_book)
                .delete(handlers::delete_book),
        )
        .with_state(state)
}
