use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BookGateway, Condition, GatewayError, GatewayResult};
use crate::modules::books::models::{Book, BookUpdate};
use crate::modules::books::query::{BookFilter, BookQuery};

/// Process-local store keyed by book id. Used when no database is
/// configured and by the test suites.
#[derive(Debug, Default)]
pub struct InMemoryBookGateway {
    books: RwLock<HashMap<String, Book>>,
}

impl InMemoryBookGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn isbn_taken(books: &HashMap<String, Book>, isbn: &str, except_id: Option<&str>) -> bool {
        books
            .values()
            .any(|book| book.isbn() == isbn && Some(book.id()) != except_id)
    }

    fn find_id(books: &HashMap<String, Book>, condition: &Condition) -> GatewayResult<String> {
        match condition {
            Condition::Id(id) if books.contains_key(id) => Ok(id.clone()),
            Condition::Id(_) => Err(GatewayError::NotFound),
            Condition::Isbn(_) => books
                .values()
                .find(|book| condition.matches(book))
                .map(|book| book.id().to_string())
                .ok_or(GatewayError::NotFound),
        }
    }
}

#[async_trait]
impl BookGateway for InMemoryBookGateway {
    async fn create(&self, book: Book) -> GatewayResult<Book> {
        let mut books = self.books.write().await;
        if books.contains_key(book.id()) || Self::isbn_taken(&books, book.isbn(), None) {
            return Err(GatewayError::Conflict(book.isbn().to_string()));
        }
        books.insert(book.id().to_string(), book.clone());
        Ok(book)
    }

    async fn get(&self, condition: &Condition) -> GatewayResult<Book> {
        let books = self.books.read().await;
        let id = Self::find_id(&books, condition)?;
        books.get(&id).cloned().ok_or(GatewayError::NotFound)
    }

    async fn update(&self, condition: &Condition, changes: &BookUpdate) -> GatewayResult<Book> {
        let mut books = self.books.write().await;
        let id = Self::find_id(&books, condition)?;

        if let Some(isbn) = &changes.isbn {
            if Self::isbn_taken(&books, isbn, Some(&id)) {
                return Err(GatewayError::Conflict(isbn.clone()));
            }
        }

        let book = books.get_mut(&id).ok_or(GatewayError::NotFound)?;
        book.apply(changes).map_err(|source| GatewayError::Corrupt {
            id: id.clone(),
            source,
        })?;
        Ok(book.clone())
    }

    async fn delete(&self, condition: &Condition) -> GatewayResult<Book> {
        let mut books = self.books.write().await;
        let id = Self::find_id(&books, condition)?;
        books.remove(&id).ok_or(GatewayError::NotFound)
    }

    async fn list(&self, query: &BookQuery) -> GatewayResult<Vec<Book>> {
        let books = self.books.read().await;
        Ok(query.select(books.values()))
    }

    async fn count(&self, filter: &BookFilter) -> GatewayResult<u64> {
        let books = self.books.read().await;
        Ok(books.values().filter(|book| filter.matches(book)).count() as u64)
    }
}
