//! Persistence seam for the books module.

mod memory;
mod mongo;

pub use memory::InMemoryBookGateway;
pub use mongo::MongoBookGateway;

use async_trait::async_trait;
use bson::{doc, Document};
use thiserror::Error;

use super::models::{Book, BookUpdate};
use super::query::{BookFilter, BookQuery};
use super::validation::ValidationError;

/// Locates the record a read, update or delete applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Id(String),
    /// Normalized ISBN.
    Isbn(String),
}

impl Condition {
    pub fn to_document(&self) -> Document {
        match self {
            Condition::Id(id) => doc! { "id": id.as_str() },
            Condition::Isbn(isbn) => doc! { "isbn": isbn.as_str() },
        }
    }

    pub fn matches(&self, book: &Book) -> bool {
        match self {
            Condition::Id(id) => book.id() == id,
            Condition::Isbn(isbn) => book.isbn() == isbn,
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Book not found")]
    NotFound,

    #[error("A book with ISBN {0} already exists")]
    Conflict(String),

    #[error("stored book {id} is invalid: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    Query(ValidationError),

    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// One method per storage verb. Every returned [`Book`] has been rebuilt
/// through entity validation.
#[async_trait]
pub trait BookGateway: Send + Sync + 'static {
    /// Fails with [`GatewayError::Conflict`] when the ISBN is taken.
    async fn create(&self, book: Book) -> GatewayResult<Book>;

    async fn get(&self, condition: &Condition) -> GatewayResult<Book>;

    /// Apply a validated patch and refresh `update_time` in one step.
    async fn update(&self, condition: &Condition, changes: &BookUpdate) -> GatewayResult<Book>;

    /// Returns the removed record.
    async fn delete(&self, condition: &Condition) -> GatewayResult<Book>;

    async fn list(&self, query: &BookQuery) -> GatewayResult<Vec<Book>>;

    async fn count(&self, filter: &BookFilter) -> GatewayResult<u64>;

    /// Create unique and lookup indexes. A no-op where the store has none.
    async fn ensure_indexes(&self) -> GatewayResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_documents() {
        assert_eq!(Condition::Id("b1".into()).to_document(), doc! { "id": "b1" });
        assert_eq!(
            Condition::Isbn("9780441013593".into()).to_document(),
            doc! { "isbn": "9780441013593" }
        );
    }

    #[test]
    fn not_found_message() {
        assert_eq!(GatewayError::NotFound.to_string(), "Book not found");
    }
}
