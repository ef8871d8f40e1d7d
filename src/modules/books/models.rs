use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::validation::{
    self, normalize_optional_text, now_millis, truncate_to_millis, Rule, ValidationError,
    ValidationResult,
};

/// Closed set of catalog genres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Fiction,
    NonFiction,
    Mystery,
    Romance,
    ScienceFiction,
    Fantasy,
    Thriller,
    Horror,
    Biography,
    History,
    SelfHelp,
    Business,
    Technology,
    Health,
    Cooking,
    Travel,
    Children,
    YoungAdult,
    Poetry,
    Drama,
    Other,
}

impl Genre {
    pub const ALL: [Genre; 21] = [
        Genre::Fiction,
        Genre::NonFiction,
        Genre::Mystery,
        Genre::Romance,
        Genre::ScienceFiction,
        Genre::Fantasy,
        Genre::Thriller,
        Genre::Horror,
        Genre::Biography,
        Genre::History,
        Genre::SelfHelp,
        Genre::Business,
        Genre::Technology,
        Genre::Health,
        Genre::Cooking,
        Genre::Travel,
        Genre::Children,
        Genre::YoungAdult,
        Genre::Poetry,
        Genre::Drama,
        Genre::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Genre::Fiction => "fiction",
            Genre::NonFiction => "non_fiction",
            Genre::Mystery => "mystery",
            Genre::Romance => "romance",
            Genre::ScienceFiction => "science_fiction",
            Genre::Fantasy => "fantasy",
            Genre::Thriller => "thriller",
            Genre::Horror => "horror",
            Genre::Biography => "biography",
            Genre::History => "history",
            Genre::SelfHelp => "self_help",
            Genre::Business => "business",
            Genre::Technology => "technology",
            Genre::Health => "health",
            Genre::Cooking => "cooking",
            Genre::Travel => "travel",
            Genre::Children => "children",
            Genre::YoungAdult => "young_adult",
            Genre::Poetry => "poetry",
            Genre::Drama => "drama",
            Genre::Other => "other",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|g| g.as_str()).collect()
    }
}

impl FromStr for Genre {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let genre = match s {
            "fiction" => Genre::Fiction,
            "non_fiction" => Genre::NonFiction,
            "mystery" => Genre::Mystery,
            "romance" => Genre::Romance,
            "science_fiction" => Genre::ScienceFiction,
            "fantasy" => Genre::Fantasy,
            "thriller" => Genre::Thriller,
            "horror" => Genre::Horror,
            "biography" => Genre::Biography,
            "history" => Genre::History,
            "self_help" => Genre::SelfHelp,
            "business" => Genre::Business,
            "technology" => Genre::Technology,
            "health" => Genre::Health,
            "cooking" => Genre::Cooking,
            "travel" => Genre::Travel,
            "children" => Genre::Children,
            "young_adult" => Genre::YoungAdult,
            "poetry" => Genre::Poetry,
            "drama" => Genre::Drama,
            "other" => Genre::Other,
            _ => {
                return Err(ValidationError::new(
                    "genre",
                    Rule::UnknownVariant,
                    "Invalid genre value",
                ))
            }
        };
        Ok(genre)
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock status. Any status may move to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Available,
    OutOfStock,
    Discontinued,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Available, Status::OutOfStock, Status::Discontinued];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Available => "available",
            Status::OutOfStock => "out_of_stock",
            Status::Discontinued => "discontinued",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Status::Available),
            "out_of_stock" => Ok(Status::OutOfStock),
            "discontinued" => Ok(Status::Discontinued),
            _ => Err(ValidationError::new(
                "status",
                Rule::UnknownVariant,
                "Invalid status value",
            )),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate field values for a book, before validation.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub id: Option<String>,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub genre: Genre,
    pub status: Option<Status>,
    pub price: f64,
    pub publication_date: OffsetDateTime,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub page_count: Option<f64>,
    pub create_time: Option<OffsetDateTime>,
    pub update_time: Option<OffsetDateTime>,
}

/// Validated, normalized book. Fields change only through the `update_*`
/// and `mark_*` operations, each of which refreshes `update_time`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Book {
    id: String,
    title: String,
    author: String,
    isbn: String,
    genre: Genre,
    status: Status,
    price: f64,
    #[serde(with = "time::serde::rfc3339")]
    publication_date: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_count: Option<u32>,
    #[serde(with = "time::serde::rfc3339")]
    create_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    update_time: OffsetDateTime,
}

impl Book {
    /// Validate every field and build the entity. Fails on the first broken
    /// rule.
    pub fn new(props: NewBook) -> ValidationResult<Self> {
        let now = now_millis();

        let title = validation::validate_title(&props.title)?;
        let author = validation::validate_author(&props.author)?;
        let isbn = validation::validate_isbn(&props.isbn)?;
        let price = validation::validate_price(props.price)?;
        let publication_date = validation::validate_publication_date(props.publication_date, now)?;
        let page_count = props
            .page_count
            .map(validation::validate_page_count)
            .transpose()?;

        let create_time = props.create_time.map(truncate_to_millis).unwrap_or(now);
        let update_time = props
            .update_time
            .map(truncate_to_millis)
            .unwrap_or(create_time);

        Ok(Self {
            id: props
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            title,
            author,
            isbn,
            genre: props.genre,
            status: props.status.unwrap_or_default(),
            price,
            publication_date,
            description: normalize_optional_text(props.description.as_deref()),
            publisher: normalize_optional_text(props.publisher.as_deref()),
            page_count,
            create_time,
            update_time,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn isbn(&self) -> &str {
        &self.isbn
    }

    pub fn genre(&self) -> Genre {
        self.genre
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn publication_date(&self) -> OffsetDateTime {
        self.publication_date
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn publisher(&self) -> Option<&str> {
        self.publisher.as_deref()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    pub fn create_time(&self) -> OffsetDateTime {
        self.create_time
    }

    pub fn update_time(&self) -> OffsetDateTime {
        self.update_time
    }

    pub fn update_title(&mut self, title: &str) -> ValidationResult<()> {
        self.title = validation::validate_title(title)?;
        self.touch();
        Ok(())
    }

    pub fn update_author(&mut self, author: &str) -> ValidationResult<()> {
        self.author = validation::validate_author(author)?;
        self.touch();
        Ok(())
    }

    pub fn update_isbn(&mut self, isbn: &str) -> ValidationResult<()> {
        self.isbn = validation::validate_isbn(isbn)?;
        self.touch();
        Ok(())
    }

    pub fn update_price(&mut self, price: f64) -> ValidationResult<()> {
        self.price = validation::validate_price(price)?;
        self.touch();
        Ok(())
    }

    pub fn update_publication_date(&mut self, date: OffsetDateTime) -> ValidationResult<()> {
        self.publication_date = validation::validate_publication_date(date, now_millis())?;
        self.touch();
        Ok(())
    }

    /// `None` clears the page count.
    pub fn update_page_count(&mut self, page_count: Option<f64>) -> ValidationResult<()> {
        self.page_count = page_count
            .map(validation::validate_page_count)
            .transpose()?;
        self.touch();
        Ok(())
    }

    pub fn update_genre(&mut self, genre: Genre) {
        self.genre = genre;
        self.touch();
    }

    pub fn update_status(&mut self, status: Status) {
        self.status = status;
        self.touch();
    }

    pub fn update_description(&mut self, description: Option<&str>) {
        self.description = normalize_optional_text(description);
        self.touch();
    }

    pub fn update_publisher(&mut self, publisher: Option<&str>) {
        self.publisher = normalize_optional_text(publisher);
        self.touch();
    }

    pub fn mark_available(&mut self) {
        self.update_status(Status::Available);
    }

    pub fn mark_out_of_stock(&mut self) {
        self.update_status(Status::OutOfStock);
    }

    pub fn mark_discontinued(&mut self) {
        self.update_status(Status::Discontinued);
    }

    /// Apply a validated patch. On error the entity is left untouched.
    /// `update_time` advances once per patch, however many fields change.
    pub fn apply(&mut self, changes: &BookUpdate) -> ValidationResult<()> {
        let mut next = self.clone();
        if let Some(title) = &changes.title {
            next.title = validation::validate_title(title)?;
        }
        if let Some(author) = &changes.author {
            next.author = validation::validate_author(author)?;
        }
        if let Some(isbn) = &changes.isbn {
            next.isbn = validation::validate_isbn(isbn)?;
        }
        if let Some(genre) = changes.genre {
            next.genre = genre;
        }
        if let Some(status) = changes.status {
            next.status = status;
        }
        if let Some(price) = changes.price {
            next.price = validation::validate_price(price)?;
        }
        if let Some(date) = changes.publication_date {
            next.publication_date = validation::validate_publication_date(date, now_millis())?;
        }
        if let Some(description) = &changes.description {
            next.description = normalize_optional_text(description.as_deref());
        }
        if let Some(publisher) = &changes.publisher {
            next.publisher = normalize_optional_text(publisher.as_deref());
        }
        if let Some(page_count) = changes.page_count {
            next.page_count = page_count
                .map(|count| validation::validate_page_count(f64::from(count)))
                .transpose()?;
        }
        next.touch();
        *self = next;
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        self.status == Status::Available
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.status == Status::OutOfStock
    }

    pub fn is_discontinued(&self) -> bool {
        self.status == Status::Discontinued
    }

    pub fn is_published_after(&self, date: OffsetDateTime) -> bool {
        self.publication_date > date
    }

    pub fn is_published_before(&self, date: OffsetDateTime) -> bool {
        self.publication_date < date
    }

    /// Inclusive on both ends; a missing bound is unbounded.
    pub fn is_price_in_range(&self, min: Option<f64>, max: Option<f64>) -> bool {
        min.map_or(true, |min| self.price >= min) && max.map_or(true, |max| self.price <= max)
    }

    /// US dollar amount with thousands separators, e.g. `$1,234.50`.
    pub fn formatted_price(&self) -> String {
        let cents = (self.price * 100.0).round() as u64;
        let dollars = (cents / 100).to_string();

        let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
        for (i, ch) in dollars.chars().enumerate() {
            if i > 0 && (dollars.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        format!("${}.{:02}", grouped, cents % 100)
    }

    /// Whole 365.25-day years between publication and now.
    pub fn age_in_years(&self) -> u32 {
        self.age_in_years_at(OffsetDateTime::now_utc())
    }

    pub fn age_in_years_at(&self, now: OffsetDateTime) -> u32 {
        const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;
        let elapsed = (now - self.publication_date).abs().as_seconds_f64();
        (elapsed / SECONDS_PER_YEAR).floor() as u32
    }

    /// Advance `update_time` to now, and strictly past its previous value
    /// even if the clock has not moved.
    fn touch(&mut self) {
        let now = now_millis();
        self.update_time = if now > self.update_time {
            now
        } else {
            self.update_time + time::Duration::milliseconds(1)
        };
    }
}

/// Validated partial update. Outer `None` leaves a field alone; for the
/// optional fields `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<Genre>,
    pub status: Option<Status>,
    pub price: Option<f64>,
    pub publication_date: Option<OffsetDateTime>,
    pub description: Option<Option<String>>,
    pub publisher: Option<Option<String>>,
    pub page_count: Option<Option<u32>>,
}

impl BookUpdate {
    pub fn is_empty(&self) -> bool {
        *self == BookUpdate::default()
    }
}

/// Request body for `POST /books`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub status: Option<String>,
    pub price: Option<f64>,
    pub publication_date: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub page_count: Option<f64>,
}

/// Request body for `PUT /books/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub status: Option<String>,
    pub price: Option<f64>,
    pub publication_date: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub page_count: Option<f64>,
}

/// Query string for `GET /books`, kept as raw strings so malformed values
/// surface as validation errors rather than extractor rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBooks {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub genre: Option<String>,
    pub status: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub publication_year: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn dune() -> NewBook {
        NewBook {
            id: None,
            title: "  Dune ".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: "978-0-441-01359-3".to_string(),
            genre: Genre::ScienceFiction,
            status: None,
            price: 15.99,
            publication_date: datetime!(1965-08-01 0:00 UTC),
            description: Some("   ".to_string()),
            publisher: Some(" Chilton Books ".to_string()),
            page_count: Some(412.0),
            create_time: None,
            update_time: None,
        }
    }

    #[test]
    fn new_book_is_normalized() {
        let book = Book::new(dune()).unwrap();
        assert_eq!(book.title(), "Dune");
        assert_eq!(book.isbn(), "9780441013593");
        assert_eq!(book.status(), Status::Available);
        assert!(book.is_available());
        assert_eq!(book.description(), None);
        assert_eq!(book.publisher(), Some("Chilton Books"));
        assert_eq!(book.page_count(), Some(412));
        assert!(uuid::Uuid::parse_str(book.id()).is_ok());
        assert_eq!(book.create_time(), book.update_time());
    }

    #[test]
    fn new_book_keeps_supplied_id() {
        let book = Book::new(NewBook {
            id: Some("book-1".to_string()),
            ..dune()
        })
        .unwrap();
        assert_eq!(book.id(), "book-1");
    }

    #[test]
    fn new_book_fails_fast_on_invalid_field() {
        let err = Book::new(NewBook {
            isbn: "9780441013594".to_string(),
            ..dune()
        })
        .unwrap_err();
        assert_eq!(err.field, "isbn");

        let err = Book::new(NewBook {
            page_count: Some(0.0),
            ..dune()
        })
        .unwrap_err();
        assert_eq!(err.field, "page_count");
    }

    #[test]
    fn every_mutation_advances_update_time() {
        let mut book = Book::new(dune()).unwrap();
        let mut last = book.update_time();

        book.mark_out_of_stock();
        assert!(book.update_time() > last);
        last = book.update_time();

        book.update_price(9.5).unwrap();
        assert!(book.update_time() > last);
        last = book.update_time();

        book.update_description(Some("Desert planet"));
        assert!(book.update_time() > last);
        assert_eq!(book.description(), Some("Desert planet"));
    }

    #[test]
    fn failed_mutation_leaves_book_unchanged() {
        let mut book = Book::new(dune()).unwrap();
        let before = book.clone();
        let changes = BookUpdate {
            title: Some("Dune Messiah".to_string()),
            price: Some(-1.0),
            ..BookUpdate::default()
        };
        assert!(book.apply(&changes).is_err());
        assert_eq!(book, before);
    }

    #[test]
    fn apply_advances_update_time_once_per_patch() {
        let ahead = now_millis() + time::Duration::hours(1);
        let mut book = Book::new(NewBook {
            update_time: Some(ahead),
            ..dune()
        })
        .unwrap();
        let changes = BookUpdate {
            title: Some("Dune Messiah".to_string()),
            author: Some("F. Herbert".to_string()),
            genre: Some(Genre::Fantasy),
            price: Some(9.99),
            publisher: Some(None),
            page_count: Some(Some(256)),
            ..BookUpdate::default()
        };
        book.apply(&changes).unwrap();
        assert_eq!(book.update_time(), ahead + time::Duration::milliseconds(1));
        assert_eq!(book.title(), "Dune Messiah");
        assert_eq!(book.page_count(), Some(256));

        book.apply(&BookUpdate::default()).unwrap();
        assert_eq!(book.update_time(), ahead + time::Duration::milliseconds(2));
    }

    #[test]
    fn apply_clears_optional_fields() {
        let mut book = Book::new(dune()).unwrap();
        let changes = BookUpdate {
            publisher: Some(None),
            page_count: Some(None),
            status: Some(Status::Discontinued),
            ..BookUpdate::default()
        };
        book.apply(&changes).unwrap();
        assert_eq!(book.publisher(), None);
        assert_eq!(book.page_count(), None);
        assert!(book.is_discontinued());
    }

    #[test]
    fn derived_values() {
        let mut book = Book::new(dune()).unwrap();
        assert_eq!(book.formatted_price(), "$15.99");
        book.update_price(1_234_567.0 / 2.0).unwrap();
        assert_eq!(book.formatted_price(), "$617,283.50");

        assert_eq!(book.age_in_years_at(datetime!(2025-07-31 0:00 UTC)), 59);
        assert_eq!(book.age_in_years_at(datetime!(2025-08-01 0:00 UTC)), 60);
        assert!(book.is_published_before(datetime!(1966-01-01 0:00 UTC)));
        assert!(book.is_published_after(datetime!(1965-01-01 0:00 UTC)));
        assert!(book.is_price_in_range(Some(600_000.0), None));
        assert!(!book.is_price_in_range(None, Some(10.0)));
    }

    #[test]
    fn enums_round_trip_through_names() {
        for genre in Genre::ALL {
            assert_eq!(genre.as_str().parse::<Genre>().unwrap(), genre);
        }
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert_eq!(Genre::names().len(), 21);
        let err = "invalid_value".parse::<Status>().unwrap_err();
        assert_eq!(err.rule, Rule::UnknownVariant);
    }

    #[test]
    fn book_serializes_with_snake_case_enums() {
        let book = Book::new(dune()).unwrap();
        let value = serde_json::to_value(&book).unwrap();
        assert_eq!(value["genre"], "science_fiction");
        assert_eq!(value["status"], "available");
        assert_eq!(value["publication_date"], "1965-08-01T00:00:00Z");
        assert!(value.get("description").is_none());
    }
}
