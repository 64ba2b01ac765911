pub mod fixtures;
pub mod models;
pub mod repository;
mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::FromRef, Router};
use serde_json::json;

use bookshelf_authz::Authorizer;
use bookshelf_cache::TagAwareCache;
use bookshelf_http::versioning::Versioning;
use bookshelf_kernel::{InitCtx, Migration, Module};

use crate::app::AppServices;
use repository::{AuthorRepository, BookRepository};

/// Tag carried by every cached book response.
pub const BOOKS_CACHE_TAG: &str = "booksCache";

/// Collaborators shared by the book handlers.
#[derive(Clone)]
pub struct BooksState {
    pub books: BookRepository,
    pub authors: AuthorRepository,
    pub cache: Arc<TagAwareCache>,
    authorizer: Authorizer,
    versioning: Versioning,
    public_url: Arc<str>,
}

impl BooksState {
    pub fn new(services: &AppServices) -> Self {
        Self {
            books: BookRepository::new(services.pool.clone()),
            authors: AuthorRepository::new(services.pool.clone()),
            cache: Arc::clone(&services.cache),
            authorizer: services.authorizer.clone(),
            versioning: services.versioning.clone(),
            public_url: Arc::from(services.public_url.trim_end_matches('/')),
        }
    }

    /// Absolute URL of the detail route for `id`.
    pub fn detail_url(&self, id: i64) -> String {
        format!("{}/api/books/{}", self.public_url, id)
    }
}

impl FromRef<BooksState> for Authorizer {
    fn from_ref(state: &BooksState) -> Self {
        state.authorizer.clone()
    }
}

impl FromRef<BooksState> for Versioning {
    fn from_ref(state: &BooksState) -> Self {
        state.versioning.clone()
    }
}

/// Book catalog module
pub struct BooksModule {
    state: BooksState,
}

impl BooksModule {
    pub fn new(state: BooksState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if ctx.settings.database.seed_on_start {
            fixtures::seed(&self.state.books, &self.state.authors).await?;
        }

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE author (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    first_name TEXT NOT NULL,
                    last_name  TEXT NOT NULL
                );
                CREATE TABLE book (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    title      TEXT NOT NULL,
                    cover_text TEXT NOT NULL DEFAULT '',
                    comment    TEXT,
                    author_id  INTEGER REFERENCES author (id) ON DELETE SET NULL
                );
                CREATE INDEX book_author_id ON book (author_id);
                "#,
        }]
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.state.cache.clear();
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn validation_response() -> serde_json::Value {
    json!({
        "description": "Validation errors",
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ValidationErrors" }
            }
        }
    })
}

fn openapi() -> serde_json::Value {
    let id_param = json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer" }
    });
    let book_body = json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookPayload" }
            }
        }
    });
    let book_response = json!({
        "description": "A book",
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/Book" }
            }
        }
    });

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "parameters": [
                        {
                            "name": "page",
                            "in": "query",
                            "description": "Page to fetch, starting at 1",
                            "schema": { "type": "integer", "minimum": 1, "default": 1 }
                        },
                        {
                            "name": "limit",
                            "in": "query",
                            "description": "Number of books per page",
                            "schema": { "type": "integer", "minimum": 1, "maximum": 100, "default": 3 }
                        }
                    ],
                    "responses": {
                        "200": {
                            "description": "List of books",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            }
                        },
                        "400": error_response("Invalid pagination parameters")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": book_body.clone(),
                    "responses": {
                        "201": book_response.clone(),
                        "400": validation_response(),
                        "403": error_response("Caller lacks the ADMIN role")
                    }
                }
            },
            "/clearCache": {
                "get": {
                    "summary": "Invalidate every cached book list",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "Cache cleared",
                            "content": {
                                "application/json": { "schema": { "type": "string" } }
                            }
                        },
                        "403": error_response("Caller lacks the ADMIN role")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get a book",
                    "description": "Send `Accept: application/json; version=2.0` to include `comment`.",
                    "tags": ["Books"],
                    "parameters": [id_param.clone()],
                    "responses": {
                        "200": book_response,
                        "404": error_response("Book not found")
                    }
                },
                "put": {
                    "summary": "Update a book",
                    "tags": ["Books"],
                    "parameters": [id_param.clone()],
                    "requestBody": book_body,
                    "responses": {
                        "204": { "description": "Updated" },
                        "400": validation_response(),
                        "403": error_response("Caller lacks the ADMIN role"),
                        "404": error_response("Book not found")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [id_param],
                    "responses": {
                        "204": { "description": "Deleted" },
                        "403": error_response("Caller lacks the ADMIN role"),
                        "404": error_response("Book not found")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Author": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "firstName": { "type": "string" },
                        "lastName": { "type": "string" }
                    },
                    "required": ["id", "firstName", "lastName"]
                },
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "title": { "type": "string" },
                        "coverText": { "type": "string" },
                        "comment": {
                            "type": "string",
                            "nullable": true,
                            "description": "Only present from API version 2.0"
                        },
                        "author": {
                            "allOf": [{ "$ref": "#/components/schemas/Author" }],
                            "nullable": true
                        }
                    },
                    "required": ["id", "title", "coverText", "author"]
                },
                "BookPayload": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "coverText": { "type": "string" },
                        "comment": { "type": "string" },
                        "idAuthor": { "type": "integer" }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_every_route() {
        let spec = openapi();
        for path in ["/", "/clearCache", "/{id}"] {
            assert!(spec["paths"][path].is_object(), "missing {path}");
        }
        assert!(spec["paths"]["/{id}"]["delete"].is_object());
        assert!(spec["components"]["schemas"]["Book"].is_object());
    }
}
