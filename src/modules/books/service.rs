//! Use cases for the books module, generic over the persistence gateway.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::gateway::{BookGateway, Condition, GatewayError};
use super::models::{Book, BookUpdate, CreateBook, NewBook, UpdateBook};
use super::query::BookQuery;
use super::validation::{self, normalize_optional_text, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Get,
    GetByIsbn,
    Update,
    Delete,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create book",
            Operation::Get => "get book",
            Operation::GetByIsbn => "get book by ISBN",
            Operation::Update => "update book",
            Operation::Delete => "delete book",
            Operation::List => "list books",
        })
    }
}

#[derive(Debug, Error)]
pub enum BookError {
    /// Input broke a field rule. Passed through untouched.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to {operation}: {source}")]
    Gateway {
        operation: Operation,
        #[source]
        source: GatewayError,
    },
}

impl BookError {
    fn wrap(operation: Operation) -> impl FnOnce(GatewayError) -> BookError {
        move |source| BookError::Gateway { operation, source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BookError::Gateway {
                source: GatewayError::NotFound,
                ..
            }
        )
    }
}

pub type BookResult<T> = Result<T, BookError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookPage {
    pub books: Vec<Book>,
    pub pagination: PageInfo,
}

pub struct BookService<G> {
    gateway: Arc<G>,
}

impl<G> Clone for BookService<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

fn required_id(id: &str) -> Result<&str, ValidationError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ValidationError::required("id", "Book ID is required"));
    }
    Ok(id)
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl<G: BookGateway> BookService<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub async fn create(&self, input: CreateBook) -> BookResult<Book> {
        let missing: Vec<&'static str> = [
            ("title", blank(&input.title)),
            ("author", blank(&input.author)),
            ("isbn", blank(&input.isbn)),
            ("genre", blank(&input.genre)),
            ("price", input.price.is_none()),
            ("publication_date", blank(&input.publication_date)),
        ]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect();

        if let Some(&first) = missing.first() {
            return Err(ValidationError::required(
                first,
                format!("Missing required fields: {}", missing.join(", ")),
            )
            .into());
        }

        let book = Book::new(NewBook {
            id: None,
            title: input.title.unwrap_or_default(),
            author: input.author.unwrap_or_default(),
            isbn: input.isbn.unwrap_or_default(),
            genre: input.genre.as_deref().unwrap_or_default().trim().parse()?,
            status: input
                .status
                .as_deref()
                .map(|s| s.trim().parse())
                .transpose()?,
            price: input.price.unwrap_or_default(),
            publication_date: validation::parse_publication_date(
                input.publication_date.as_deref().unwrap_or_default(),
            )?,
            description: input.description,
            publisher: input.publisher,
            page_count: input.page_count,
            create_time: None,
            update_time: None,
        })?;

        let book = self
            .gateway
            .create(book)
            .await
            .map_err(BookError::wrap(Operation::Create))?;
        tracing::info!(id = %book.id(), isbn = %book.isbn(), "book created");
        Ok(book)
    }

    pub async fn get(&self, id: &str) -> BookResult<Book> {
        let id = required_id(id)?;
        self.gateway
            .get(&Condition::Id(id.to_string()))
            .await
            .map_err(BookError::wrap(Operation::Get))
    }

    pub async fn get_by_isbn(&self, isbn: &str) -> BookResult<Book> {
        let isbn = validation::validate_isbn(isbn)?;
        self.gateway
            .get(&Condition::Isbn(isbn))
            .await
            .map_err(BookError::wrap(Operation::GetByIsbn))
    }

    /// Present fields must satisfy the field rules; absent ones are left
    /// alone. Blank `description` or `publisher` clears the stored value.
    pub async fn update(&self, id: &str, input: UpdateBook) -> BookResult<Book> {
        let id = required_id(id)?;
        let changes = Self::changes(input)?;

        let book = self
            .gateway
            .update(&Condition::Id(id.to_string()), &changes)
            .await
            .map_err(BookError::wrap(Operation::Update))?;
        tracing::info!(id = %book.id(), "book updated");
        Ok(book)
    }

    fn changes(input: UpdateBook) -> Result<BookUpdate, ValidationError> {
        let now = validation::now_millis();
        Ok(BookUpdate {
            title: input
                .title
                .as_deref()
                .map(validation::validate_title)
                .transpose()?,
            author: input
                .author
                .as_deref()
                .map(validation::validate_author)
                .transpose()?,
            isbn: input
                .isbn
                .as_deref()
                .map(validation::validate_isbn)
                .transpose()?,
            genre: input.genre.as_deref().map(|g| g.trim().parse()).transpose()?,
            status: input
                .status
                .as_deref()
                .map(|s| s.trim().parse())
                .transpose()?,
            price: input
                .price
                .map(validation::validate_price)
                .transpose()?,
            publication_date: input
                .publication_date
                .as_deref()
                .map(|raw| {
                    validation::parse_publication_date(raw)
                        .and_then(|date| validation::validate_publication_date(date, now))
                })
                .transpose()?,
            description: input
                .description
                .as_deref()
                .map(|d| normalize_optional_text(Some(d))),
            publisher: input
                .publisher
                .as_deref()
                .map(|p| normalize_optional_text(Some(p))),
            page_count: input
                .page_count
                .map(|n| validation::validate_page_count(n).map(Some))
                .transpose()?,
        })
    }

    /// Existence is checked first so a missing book reports not found
    /// rather than a failed delete.
    pub async fn delete(&self, id: &str) -> BookResult<Book> {
        let id = required_id(id)?;
        let condition = Condition::Id(id.to_string());

        self.gateway
            .get(&condition)
            .await
            .map_err(BookError::wrap(Operation::Delete))?;
        let book = self
            .gateway
            .delete(&condition)
            .await
            .map_err(BookError::wrap(Operation::Delete))?;
        tracing::info!(id = %book.id(), "book deleted");
        Ok(book)
    }

    pub async fn list(&self, query: &BookQuery) -> BookResult<BookPage> {
        let (books, total) = futures::try_join!(
            self.gateway.list(query),
            self.gateway.count(&query.filter)
        )
        .map_err(BookError::wrap(Operation::List))?;

        let pagination = PageInfo {
            page: query.pagination.page(),
            limit: query.pagination.limit(),
            total,
            total_pages: query.pagination.total_pages(total),
        };
        Ok(BookPage { books, pagination })
    }
}
