//! HTTP handlers for `/books`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use bookshelf_http::{error::AppError, response::ApiResponse};
use serde_json::json;

use super::gateway::{BookGateway, GatewayError};
use super::models::{Book, CreateBook, Genre, ListBooks, Status, UpdateBook};
use super::query::BookQuery;
use super::service::{BookError, BookService};
use super::validation::{Rule, ValidationError};

pub fn router<G: BookGateway>(service: BookService<G>) -> Router {
    Router::new()
        .route("/", get(list_books::<G>).post(create_book::<G>))
        .route("/isbn/{isbn}", get(get_book_by_isbn::<G>))
        .route(
            "/{id}",
            get(get_book::<G>)
                .put(update_book::<G>)
                .delete(delete_book::<G>),
        )
        .with_state(service)
}

fn validation_error(err: ValidationError) -> AppError {
    let hint = match (err.field, err.rule) {
        ("genre", Rule::UnknownVariant) => Some(("validGenres", json!(Genre::names()))),
        ("status", Rule::UnknownVariant) => Some(("validStatuses", json!(Status::names()))),
        _ => None,
    };
    let error = AppError::validation(vec![err.detail()], err.message);
    match hint {
        Some((key, values)) => error.with_hint(key, values),
        None => error,
    }
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        let message = err.to_string();
        match err {
            BookError::Validation(e) => validation_error(e),
            BookError::Gateway { source, .. } => match source {
                GatewayError::NotFound => AppError::not_found("Book not found"),
                GatewayError::Query(e) => validation_error(e),
                GatewayError::Conflict(isbn) => AppError::conflict(
                    vec![json!({ "field": "isbn", "value": isbn, "error": "ISBN already exists" })],
                    message,
                ),
                source => AppError::Internal(anyhow::Error::new(source).context(message)),
            },
        }
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

async fn create_book<G: BookGateway>(
    State(service): State<BookService<G>>,
    body: Result<Json<CreateBook>, JsonRejection>,
) -> Result<ApiResponse<Book>, AppError> {
    let book = service.create(json_body(body)?).await?;
    Ok(ApiResponse::created("Book created successfully", book))
}

async fn get_book<G: BookGateway>(
    State(service): State<BookService<G>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Book>, AppError> {
    let book = service.get(&id).await?;
    Ok(ApiResponse::ok("Book retrieved successfully", book))
}

async fn get_book_by_isbn<G: BookGateway>(
    State(service): State<BookService<G>>,
    Path(isbn): Path<String>,
) -> Result<ApiResponse<Book>, AppError> {
    let book = service.get_by_isbn(&isbn).await?;
    Ok(ApiResponse::ok("Book retrieved successfully", book))
}

async fn update_book<G: BookGateway>(
    State(service): State<BookService<G>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateBook>, JsonRejection>,
) -> Result<ApiResponse<Book>, AppError> {
    let book = service.update(&id, json_body(body)?).await?;
    Ok(ApiResponse::ok("Book updated successfully", book))
}

async fn delete_book<G: BookGateway>(
    State(service): State<BookService<G>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    service.delete(&id).await?;
    Ok(ApiResponse::message("Book deleted successfully"))
}

async fn list_books<G: BookGateway>(
    State(service): State<BookService<G>>,
    params: Result<Query<ListBooks>, QueryRejection>,
) -> Result<ApiResponse<Vec<Book>>, AppError> {
    let Query(params) = params.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let query = BookQuery::from_params(&params).map_err(validation_error)?;
    let page = service.list(&query).await?;

    Ok(
        ApiResponse::ok("Books retrieved successfully", page.books)
            .with_pagination(page.pagination)
            .with_filters(query.echo()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::gateway::InMemoryBookGateway;
    use crate::modules::books::service::Operation;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let service = BookService::new(Arc::new(InMemoryBookGateway::new()));
        Router::new().nest("/books", router(service))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn dune() -> Value {
        json!({
            "title": "Dune",
            "author": "Frank Herbert",
            "isbn": "9780441013593",
            "genre": "science_fiction",
            "price": 15.99,
            "publication_date": "1965-08-01"
        })
    }

    #[test]
    fn gateway_failures_map_to_status_codes() {
        let not_found: AppError = BookError::Gateway {
            operation: Operation::Get,
            source: GatewayError::NotFound,
        }
        .into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let corrupt: AppError = BookError::Gateway {
            operation: Operation::List,
            source: GatewayError::Corrupt {
                id: "b1".to_string(),
                source: ValidationError::new("price", Rule::BelowMinimum, "Price cannot be negative"),
            },
        }
        .into();
        assert_eq!(corrupt.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(corrupt.to_string().starts_with("Failed to list books: "));
    }

    #[tokio::test]
    async fn create_dune() {
        let app = app();
        let (status, body) = send(&app, Method::POST, "/books", Some(dune())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Book created successfully");
        assert_eq!(body["data"]["status"], "available");
        assert_eq!(body["data"]["publication_date"], "1965-08-01T00:00:00Z");
        assert!(body["data"]["id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn duplicate_isbn_is_409() {
        let app = app();
        send(&app, Method::POST, "/books", Some(dune())).await;
        let (status, body) = send(&app, Method::POST, "/books", Some(dune())).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "conflict");
        assert_eq!(body["details"][0]["field"], "isbn");
    }

    #[tokio::test]
    async fn invalid_fields_are_400() {
        let app = app();
        let mut bad_isbn = dune();
        bad_isbn["isbn"] = json!("9780441013594");
        let (status, body) = send(&app, Method::POST, "/books", Some(bad_isbn)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid ISBN format");
        assert_eq!(body["details"][0]["field"], "isbn");

        let mut bad_genre = dune();
        bad_genre["genre"] = json!("cookbooks");
        let (status, body) = send(&app, Method::POST, "/books", Some(bad_genre)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["validGenres"].as_array().map(Vec::len), Some(21));
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let app = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/books")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_with_invalid_status_lists_valid_statuses() {
        let app = app();
        let (_, created) = send(&app, Method::POST, "/books", Some(dune())).await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/books/{id}"),
            Some(json!({ "status": "invalid_value" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid status value");
        assert_eq!(
            body["validStatuses"],
            json!(["available", "out_of_stock", "discontinued"])
        );
    }

    #[tokio::test]
    async fn get_by_id_and_isbn() {
        let app = app();
        let (_, created) = send(&app, Method::POST, "/books", Some(dune())).await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::GET, &format!("/books/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], created["data"]);

        let (status, body) = send(&app, Method::GET, "/books/isbn/978-0441013593", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], json!(id));

        let (status, _) = send(&app, Method::GET, "/books/isbn/not-an-isbn", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_then_get_is_404() {
        let app = app();
        let (_, created) = send(&app, Method::POST, "/books", Some(dune())).await;
        let uri = format!("/books/{}", created["data"]["id"].as_str().unwrap());

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Book deleted successfully");

        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Book not found");
        assert_eq!(body["code"], "not_found");

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_by_price_range() {
        let app = app();
        for (title, isbn, price) in [
            ("Cheap", "0441013597", 5.0),
            ("Mid", "9780441013593", 15.0),
            ("Dear", "9780306406157", 25.0),
        ] {
            let mut book = dune();
            book["title"] = json!(title);
            book["isbn"] = json!(isbn);
            book["price"] = json!(price);
            send(&app, Method::POST, "/books", Some(book)).await;
        }

        let (status, body) = send(&app, Method::GET, "/books?minPrice=10&maxPrice=20", None).await;
        assert_eq!(status, StatusCode::OK);
        let books = body["data"].as_array().unwrap();
        assert_eq!(books.len(), 1);
        assert!(books.iter().all(|b| {
            let price = b["price"].as_f64().unwrap();
            (10.0..=20.0).contains(&price)
        }));
        assert_eq!(
            body["pagination"],
            json!({ "page": 1, "limit": 10, "total": 1, "totalPages": 1 })
        );
        assert_eq!(body["filters"]["minPrice"], json!(10.0));

        let (status, body) = send(&app, Method::GET, "/books?genre=westerns", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["validGenres"].is_array());
    }
}
