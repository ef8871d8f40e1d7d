//! List queries: filter, pagination and sort.
//!
//! A [`BookQuery`] renders to a MongoDB filter/sort pair and can also be
//! evaluated directly against a [`Book`], so every gateway answers a list
//! request the same way.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bson::{doc, Bson, Document};
use serde_json::{json, Map, Value};

use super::models::{Book, Genre, ListBooks, Status};
use super::validation::{year_bounds, Rule, ValidationError, ValidationResult};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Inclusive price bounds; a missing side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    pub genre: Option<Genre>,
    pub status: Option<Status>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub search: Option<String>,
    pub price: PriceRange,
    pub publication_year: Option<i32>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn ci_regex(term: &str) -> Document {
    doc! { "$regex": regex::escape(term), "$options": "i" }
}

impl BookFilter {
    /// MongoDB filter document. An empty filter matches everything.
    pub fn to_document(&self) -> ValidationResult<Document> {
        let mut filter = Document::new();

        if let Some(genre) = self.genre {
            filter.insert("genre", genre.as_str());
        }
        if let Some(status) = self.status {
            filter.insert("status", status.as_str());
        }
        if let Some(author) = &self.author {
            filter.insert("author", ci_regex(author));
        }
        if let Some(publisher) = &self.publisher {
            filter.insert("publisher", ci_regex(publisher));
        }

        if !self.price.is_empty() {
            let mut range = Document::new();
            if let Some(min) = self.price.min {
                range.insert("$gte", min);
            }
            if let Some(max) = self.price.max {
                range.insert("$lte", max);
            }
            filter.insert("price", range);
        }

        if let Some(year) = self.publication_year {
            let (start, end) = year_bounds(year)?;
            filter.insert(
                "publication_date",
                doc! {
                    "$gte": bson::DateTime::from_time_0_3(start),
                    "$lt": bson::DateTime::from_time_0_3(end),
                },
            );
        }

        if let Some(search) = &self.search {
            let clauses: Vec<Bson> = ["title", "author", "description", "publisher", "isbn"]
                .iter()
                .map(|field| Bson::Document(doc! { *field: ci_regex(search) }))
                .collect();
            filter.insert("$or", clauses);
        }

        Ok(filter)
    }

    /// Evaluate the filter in process with the same semantics as
    /// [`BookFilter::to_document`].
    pub fn matches(&self, book: &Book) -> bool {
        if self.genre.is_some_and(|genre| genre != book.genre()) {
            return false;
        }
        if self.status.is_some_and(|status| status != book.status()) {
            return false;
        }
        if let Some(author) = &self.author {
            if !contains_ci(book.author(), author) {
                return false;
            }
        }
        if let Some(publisher) = &self.publisher {
            if !book.publisher().is_some_and(|p| contains_ci(p, publisher)) {
                return false;
            }
        }
        if !book.is_price_in_range(self.price.min, self.price.max) {
            return false;
        }
        if let Some(year) = self.publication_year {
            match year_bounds(year) {
                Ok((start, end)) => {
                    let published = book.publication_date();
                    if published < start || published >= end {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }
        if let Some(search) = &self.search {
            let hit = contains_ci(book.title(), search)
                || contains_ci(book.author(), search)
                || book.description().is_some_and(|d| contains_ci(d, search))
                || book.publisher().is_some_and(|p| contains_ci(p, search))
                || contains_ci(book.isbn(), search);
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Page is floored at 1, limit clamped to `1..=100`.
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.max(1) as u64,
            limit: limit.clamp(1, MAX_PAGE_SIZE as i64) as u64,
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreateTime,
    UpdateTime,
    Title,
    Author,
    Price,
    PublicationDate,
    PageCount,
}

impl SortField {
    pub const ALL: [SortField; 7] = [
        SortField::CreateTime,
        SortField::UpdateTime,
        SortField::Title,
        SortField::Author,
        SortField::Price,
        SortField::PublicationDate,
        SortField::PageCount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::CreateTime => "create_time",
            SortField::UpdateTime => "update_time",
            SortField::Title => "title",
            SortField::Author => "author",
            SortField::Price => "price",
            SortField::PublicationDate => "publication_date",
            SortField::PageCount => "page_count",
        }
    }

    fn compare(self, a: &Book, b: &Book) -> Ordering {
        match self {
            SortField::CreateTime => a.create_time().cmp(&b.create_time()),
            SortField::UpdateTime => a.update_time().cmp(&b.update_time()),
            SortField::Title => a.title().cmp(b.title()),
            SortField::Author => a.author().cmp(b.author()),
            SortField::Price => a.price().total_cmp(&b.price()),
            SortField::PublicationDate => a.publication_date().cmp(&b.publication_date()),
            SortField::PageCount => a.page_count().cmp(&b.page_count()),
        }
    }
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| {
                ValidationError::new("sort_by", Rule::UnknownVariant, "Invalid sort field")
            })
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    fn direction(self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(ValidationError::new(
                "sort_order",
                Rule::UnknownVariant,
                "Sort order must be 'asc' or 'desc'",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Sort {
    /// Sort document with `id` as a stable tie-breaker.
    pub fn to_document(&self) -> Document {
        doc! {
            self.field.as_str(): self.order.direction(),
            "id": 1,
        }
    }

    pub fn compare(&self, a: &Book, b: &Book) -> Ordering {
        let primary = match self.order {
            SortOrder::Asc => self.field.compare(a, b),
            SortOrder::Desc => self.field.compare(b, a),
        };
        primary.then_with(|| a.id().cmp(b.id()))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookQuery {
    pub filter: BookFilter,
    pub pagination: Pagination,
    pub sort: Sort,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_integer(field: &'static str, label: &str, raw: &str) -> ValidationResult<i64> {
    raw.parse::<i64>().map_err(|_| {
        ValidationError::new(field, Rule::NotAnInteger, format!("{label} must be an integer"))
    })
}

fn parse_price(field: &'static str, label: &str, raw: &str) -> ValidationResult<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| {
            ValidationError::new(
                field,
                Rule::NotANumber,
                format!("{label} must be a valid number"),
            )
        })
}

impl BookQuery {
    /// Interpret raw query-string values. Enum, number and sort values that
    /// do not parse are rejected; blank values are ignored.
    pub fn from_params(params: &ListBooks) -> ValidationResult<Self> {
        let page = non_blank(&params.page)
            .map(|raw| parse_integer("page", "Page", raw))
            .transpose()?
            .unwrap_or(1);
        let limit = non_blank(&params.limit)
            .map(|raw| parse_integer("limit", "Limit", raw))
            .transpose()?
            .unwrap_or(DEFAULT_PAGE_SIZE as i64);

        let publication_year = non_blank(&params.publication_year)
            .map(|raw| {
                let year = parse_integer("publication_year", "Publication year", raw)?;
                let year = i32::try_from(year).map_err(|_| {
                    ValidationError::new(
                        "publication_year",
                        Rule::OutOfRange,
                        "Publication year is out of range",
                    )
                })?;
                year_bounds(year).map(|_| year)
            })
            .transpose()?;

        let filter = BookFilter {
            genre: non_blank(&params.genre).map(str::parse).transpose()?,
            status: non_blank(&params.status).map(str::parse).transpose()?,
            author: non_blank(&params.author).map(str::to_string),
            publisher: non_blank(&params.publisher).map(str::to_string),
            search: non_blank(&params.search).map(str::to_string),
            price: PriceRange {
                min: non_blank(&params.min_price)
                    .map(|raw| parse_price("min_price", "Minimum price", raw))
                    .transpose()?,
                max: non_blank(&params.max_price)
                    .map(|raw| parse_price("max_price", "Maximum price", raw))
                    .transpose()?,
            },
            publication_year,
        };

        let sort = Sort {
            field: non_blank(&params.sort_by)
                .map(str::parse)
                .transpose()?
                .unwrap_or_default(),
            order: non_blank(&params.sort_order)
                .map(str::parse)
                .transpose()?
                .unwrap_or_default(),
        };

        Ok(Self {
            filter,
            pagination: Pagination::new(page, limit),
            sort,
        })
    }

    /// Apply filter, sort and pagination to an in-memory snapshot.
    pub fn select<'a>(&self, books: impl IntoIterator<Item = &'a Book>) -> Vec<Book> {
        let mut hits: Vec<&Book> = books
            .into_iter()
            .filter(|book| self.filter.matches(book))
            .collect();
        hits.sort_by(|a, b| self.sort.compare(a, b));
        hits.into_iter()
            .skip(self.pagination.skip() as usize)
            .take(self.pagination.limit() as usize)
            .cloned()
            .collect()
    }

    /// Applied filters, echoed back to the client alongside the results.
    pub fn echo(&self) -> Value {
        let mut filters = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                filters.insert(key.to_string(), value);
            }
        };
        put("genre", self.filter.genre.map(|g| json!(g.as_str())));
        put("status", self.filter.status.map(|s| json!(s.as_str())));
        put("author", self.filter.author.as_ref().map(|a| json!(a)));
        put("publisher", self.filter.publisher.as_ref().map(|p| json!(p)));
        put("search", self.filter.search.as_ref().map(|s| json!(s)));
        put("minPrice", self.filter.price.min.map(|p| json!(p)));
        put("maxPrice", self.filter.price.max.map(|p| json!(p)));
        put("publicationYear", self.filter.publication_year.map(|y| json!(y)));
        put("sortBy", Some(json!(self.sort.field.as_str())));
        put("sortOrder", Some(json!(self.sort.order.as_str())));
        Value::Object(filters)
    }
}
