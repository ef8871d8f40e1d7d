//! Book catalog: entity rules, list queries, persistence and HTTP surface.

pub mod gateway;
pub mod models;
pub mod query;
pub mod routes;
pub mod service;
pub mod validation;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Module};
use serde_json::{json, Value};

use gateway::BookGateway;
use models::{Genre, Status};
use service::BookService;

pub struct BooksModule<G> {
    service: BookService<G>,
}

impl<G: BookGateway> BooksModule<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            service: BookService::new(Arc::new(gateway)),
        }
    }

    pub fn service(&self) -> &BookService<G> {
        &self.service
    }
}

#[async_trait]
impl<G: BookGateway> Module for BooksModule<G> {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.service
            .gateway()
            .ensure_indexes()
            .await
            .context("failed to create book indexes")?;
        tracing::info!(
            module = self.name(),
            environment = ctx.settings.environment.as_str(),
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn openapi(&self) -> Option<Value> {
        Some(openapi())
    }
}

fn envelope(data: Value) -> Value {
    json!({
        "type": "object",
        "properties": {
            "success": { "type": "boolean" },
            "message": { "type": "string" },
            "data": data
        }
    })
}

fn json_content(schema: Value) -> Value {
    json!({ "application/json": { "schema": schema } })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": json_content(json!({ "$ref": "#/components/schemas/ErrorResponse" }))
    })
}

fn book_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": json_content(envelope(json!({ "$ref": "#/components/schemas/Book" })))
    })
}

fn path_param(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "in": "path",
        "required": true,
        "description": description,
        "schema": { "type": "string" }
    })
}

fn query_param(name: &str, schema: Value) -> Value {
    json!({ "name": name, "in": "query", "required": false, "schema": schema })
}

fn openapi() -> Value {
    let book_fields = json!({
        "title": { "type": "string", "maxLength": 255 },
        "author": { "type": "string", "maxLength": 255 },
        "isbn": { "type": "string", "description": "ISBN-10 or ISBN-13; hyphens and spaces are ignored" },
        "genre": { "type": "string", "enum": Genre::names() },
        "status": { "type": "string", "enum": Status::names() },
        "price": { "type": "number", "minimum": 0, "maximum": 999999.99 },
        "publication_date": { "type": "string", "description": "YYYY-MM-DD or RFC 3339" },
        "description": { "type": "string" },
        "publisher": { "type": "string" },
        "page_count": { "type": "integer", "minimum": 1, "maximum": 50000 }
    });

    let mut book = book_fields.clone();
    book["id"] = json!({ "type": "string" });
    book["publication_date"] = json!({ "type": "string", "format": "date-time" });
    book["create_time"] = json!({ "type": "string", "format": "date-time" });
    book["update_time"] = json!({ "type": "string", "format": "date-time" });

    let id = path_param("id", "Book identifier");
    let body = |schema: &str| {
        json!({
            "required": true,
            "content": json_content(json!({ "$ref": format!("#/components/schemas/{schema}") }))
        })
    };

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "parameters": [
                        query_param("page", json!({ "type": "integer", "minimum": 1, "default": 1 })),
                        query_param("limit", json!({ "type": "integer", "minimum": 1, "maximum": 100, "default": 10 })),
                        query_param("genre", json!({ "type": "string", "enum": Genre::names() })),
                        query_param("status", json!({ "type": "string", "enum": Status::names() })),
                        query_param("author", json!({ "type": "string" })),
                        query_param("publisher", json!({ "type": "string" })),
                        query_param("search", json!({ "type": "string" })),
                        query_param("minPrice", json!({ "type": "number" })),
                        query_param("maxPrice", json!({ "type": "number" })),
                        query_param("publicationYear", json!({ "type": "integer" })),
                        query_param("sortBy", json!({
                            "type": "string",
                            "enum": ["create_time", "update_time", "title", "author", "price", "publication_date", "page_count"],
                            "default": "create_time"
                        })),
                        query_param("sortOrder", json!({ "type": "string", "enum": ["asc", "desc"], "default": "desc" }))
                    ],
                    "responses": {
                        "200": {
                            "description": "Books retrieved successfully",
                            "content": json_content(envelope(json!({
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/Book" }
                            })))
                        },
                        "400": error_response("Invalid query parameter"),
                        "500": error_response("Internal server error")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": body("CreateBook"),
                    "responses": {
                        "201": book_response("Book created successfully"),
                        "400": error_response("Validation error"),
                        "409": error_response("ISBN already exists"),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "parameters": [id.clone()],
                    "responses": {
                        "200": book_response("Book retrieved successfully"),
                        "404": error_response("Book not found"),
                        "500": error_response("Internal server error")
                    }
                },
                "put": {
                    "summary": "Update a book",
                    "tags": ["Books"],
                    "parameters": [id.clone()],
                    "requestBody": body("UpdateBook"),
                    "responses": {
                        "200": book_response("Book updated successfully"),
                        "400": error_response("Validation error"),
                        "404": error_response("Book not found"),
                        "409": error_response("ISBN already exists"),
                        "500": error_response("Internal server error")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [id],
                    "responses": {
                        "200": {
                            "description": "Book deleted successfully",
                            "content": json_content(envelope(json!({})))
                        },
                        "404": error_response("Book not found"),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/isbn/{isbn}": {
                "get": {
                    "summary": "Get a book by ISBN",
                    "tags": ["Books"],
                    "parameters": [path_param("isbn", "ISBN-10 or ISBN-13")],
                    "responses": {
                        "200": book_response("Book retrieved successfully"),
                        "400": error_response("Invalid ISBN"),
                        "404": error_response("Book not found"),
                        "500": error_response("Internal server error")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": book,
                    "required": ["id", "title", "author", "isbn", "genre", "status", "price", "publication_date", "create_time", "update_time"]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": book_fields.clone(),
                    "required": ["title", "author", "isbn", "genre", "price", "publication_date"]
                },
                "UpdateBook": {
                    "type": "object",
                    "properties": book_fields
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway::InMemoryBookGateway;

    #[test]
    fn openapi_fragment_covers_every_route() {
        let spec = BooksModule::new(InMemoryBookGateway::new()).openapi().unwrap();
        let paths = spec["paths"].as_object().unwrap();
        assert_eq!(paths.len(), 3);
        assert!(spec["paths"]["/"]["post"].is_object());
        assert!(spec["paths"]["/{id}"]["delete"].is_object());
        assert_eq!(
            spec["components"]["schemas"]["Book"]["properties"]["genre"]["enum"]
                .as_array()
                .map(Vec::len),
            Some(21)
        );
    }
}
