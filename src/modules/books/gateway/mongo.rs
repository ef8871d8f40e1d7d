use async_trait::async_trait;
use bookshelf_db::Database;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
    Collection, IndexModel,
};
use serde::{Deserialize, Serialize};

use super::{BookGateway, Condition, GatewayError, GatewayResult};
use crate::modules::books::models::{Book, BookUpdate, NewBook};
use crate::modules::books::query::{BookFilter, BookQuery};
use crate::modules::books::validation::now_millis;

const DUPLICATE_KEY: i32 = 11000;

/// Stored shape of a book. Enums are kept as their snake_case names and
/// timestamps as BSON dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BookRecord {
    id: String,
    title: String,
    author: String,
    isbn: String,
    genre: String,
    status: String,
    price: f64,
    publication_date: bson::DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_count: Option<i64>,
    create_time: bson::DateTime,
    update_time: bson::DateTime,
}

impl From<&Book> for BookRecord {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id().to_string(),
            title: book.title().to_string(),
            author: book.author().to_string(),
            isbn: book.isbn().to_string(),
            genre: book.genre().as_str().to_string(),
            status: book.status().as_str().to_string(),
            price: book.price(),
            publication_date: bson::DateTime::from_time_0_3(book.publication_date()),
            description: book.description().map(str::to_string),
            publisher: book.publisher().map(str::to_string),
            page_count: book.page_count().map(i64::from),
            create_time: bson::DateTime::from_time_0_3(book.create_time()),
            update_time: bson::DateTime::from_time_0_3(book.update_time()),
        }
    }
}

impl BookRecord {
    /// Rebuild the entity through validation so stored data obeys the same
    /// rules as fresh input.
    fn into_book(self) -> GatewayResult<Book> {
        let id = self.id.clone();
        let corrupt = |source| GatewayError::Corrupt {
            id: id.clone(),
            source,
        };

        Book::new(NewBook {
            id: Some(self.id),
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            genre: self.genre.parse().map_err(corrupt)?,
            status: Some(self.status.parse().map_err(corrupt)?),
            price: self.price,
            publication_date: self.publication_date.to_time_0_3(),
            description: self.description,
            publisher: self.publisher,
            page_count: self.page_count.map(|n| n as f64),
            create_time: Some(self.create_time.to_time_0_3()),
            update_time: Some(self.update_time.to_time_0_3()),
        })
        .map_err(corrupt)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
        ErrorKind::Command(command) => command.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Update pipeline for a validated patch: a `$set` stage, then an `$unset`
/// stage when fields are cleared. `update_time` is always set.
fn update_pipeline(changes: &BookUpdate) -> Vec<Document> {
    let mut set = Document::new();
    let mut unset: Vec<&str> = Vec::new();

    if let Some(title) = &changes.title {
        set.insert("title", literal(title));
    }
    if let Some(author) = &changes.author {
        set.insert("author", literal(author));
    }
    if let Some(isbn) = &changes.isbn {
        set.insert("isbn", literal(isbn));
    }
    if let Some(genre) = changes.genre {
        set.insert("genre", genre.as_str());
    }
    if let Some(status) = changes.status {
        set.insert("status", status.as_str());
    }
    if let Some(price) = changes.price {
        set.insert("price", price);
    }
    if let Some(date) = changes.publication_date {
        set.insert("publication_date", bson::DateTime::from_time_0_3(date));
    }
    match &changes.description {
        Some(Some(description)) => {
            set.insert("description", literal(description));
        }
        Some(None) => unset.push("description"),
        None => {}
    }
    match &changes.publisher {
        Some(Some(publisher)) => {
            set.insert("publisher", literal(publisher));
        }
        Some(None) => unset.push("publisher"),
        None => {}
    }
    match changes.page_count {
        Some(Some(page_count)) => {
            set.insert("page_count", i64::from(page_count));
        }
        Some(None) => unset.push("page_count"),
        None => {}
    }
    // Never at or behind the stored value, even if the server clock lags it.
    set.insert(
        "update_time",
        doc! {
            "$max": [
                bson::DateTime::from_time_0_3(now_millis()),
                { "$add": ["$update_time", 1] },
            ]
        },
    );

    let mut pipeline = vec![doc! { "$set": set }];
    if !unset.is_empty() {
        pipeline.push(doc! { "$unset": unset });
    }
    pipeline
}

/// Pipeline stages read strings starting with `$` as field paths.
fn literal(value: &str) -> Document {
    doc! { "$literal": value }
}

/// Gateway over a single MongoDB collection.
#[derive(Clone, Debug)]
pub struct MongoBookGateway {
    collection: Collection<BookRecord>,
}

impl MongoBookGateway {
    pub fn new(database: &Database, collection: &str) -> Self {
        Self {
            collection: database.collection(collection),
        }
    }

    fn write_error(err: mongodb::error::Error, isbn: &str) -> GatewayError {
        if is_duplicate_key(&err) {
            GatewayError::Conflict(isbn.to_string())
        } else {
            GatewayError::Database(err)
        }
    }
}

#[async_trait]
impl BookGateway for MongoBookGateway {
    async fn create(&self, book: Book) -> GatewayResult<Book> {
        let record = BookRecord::from(&book);
        self.collection
            .insert_one(&record)
            .await
            .map_err(|err| Self::write_error(err, book.isbn()))?;
        tracing::debug!(id = %book.id(), "book inserted");
        Ok(book)
    }

    async fn get(&self, condition: &Condition) -> GatewayResult<Book> {
        self.collection
            .find_one(condition.to_document())
            .await?
            .ok_or(GatewayError::NotFound)?
            .into_book()
    }

    async fn update(&self, condition: &Condition, changes: &BookUpdate) -> GatewayResult<Book> {
        let isbn = changes.isbn.clone().unwrap_or_default();
        self.collection
            .find_one_and_update(condition.to_document(), update_pipeline(changes))
            .return_document(ReturnDocument::After)
            .await
            .map_err(|err| Self::write_error(err, &isbn))?
            .ok_or(GatewayError::NotFound)?
            .into_book()
    }

    async fn delete(&self, condition: &Condition) -> GatewayResult<Book> {
        self.collection
            .find_one_and_delete(condition.to_document())
            .await?
            .ok_or(GatewayError::NotFound)?
            .into_book()
    }

    async fn list(&self, query: &BookQuery) -> GatewayResult<Vec<Book>> {
        let filter = query.filter.to_document().map_err(GatewayError::Query)?;
        let records: Vec<BookRecord> = self
            .collection
            .find(filter)
            .sort(query.sort.to_document())
            .skip(query.pagination.skip())
            .limit(query.pagination.limit() as i64)
            .await?
            .try_collect()
            .await?;

        records.into_iter().map(BookRecord::into_book).collect()
    }

    async fn count(&self, filter: &BookFilter) -> GatewayResult<u64> {
        let filter = filter.to_document().map_err(GatewayError::Query)?;
        Ok(self.collection.count_documents(filter).await?)
    }

    async fn ensure_indexes(&self) -> GatewayResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(unique())
                .build(),
            IndexModel::builder()
                .keys(doc! { "isbn": 1 })
                .options(unique())
                .build(),
            IndexModel::builder().keys(doc! { "title": 1 }).build(),
            IndexModel::builder().keys(doc! { "author": 1 }).build(),
            IndexModel::builder().keys(doc! { "create_time": -1 }).build(),
        ];
        self.collection.create_indexes(indexes).await?;
        tracing::info!(collection = %self.collection.name(), "book indexes ensured");
        Ok(())
    }
}
