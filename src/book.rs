//! The book record stored in the `books` collection.
//!
//! Records are kept as plain BSON documents in the store. `Book` is the typed
//! view used by the facade; conversion in both directions happens here so the
//! rest of the crate never touches raw field names except through
//! [`fields`].

use crate::errors::{BookstoreError, Result};
use crate::query::as_f64;
use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument, doc};
use serde::{Deserialize, Serialize};

/// Stored field names.
pub mod fields {
    pub const ID: &str = "_id";
    pub const TITLE: &str = "title";
    pub const AUTHOR: &str = "author";
    pub const GENRE: &str = "genre";
    pub const PUBLISHED_YEAR: &str = "published_year";
    pub const PRICE: &str = "price";
    pub const IN_STOCK: &str = "in_stock";
    pub const PAGES: &str = "pages";
    pub const PUBLISHER: &str = "publisher";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i32,
    pub price: f64,
    pub in_stock: bool,
    pub pages: i32,
    pub publisher: String,
}

impl Book {
    /// Builds an unsaved record; the store assigns `_id` on insert.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: &str,
        author: &str,
        genre: &str,
        published_year: i32,
        price: f64,
        in_stock: bool,
        pages: i32,
        publisher: &str,
    ) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            published_year,
            price,
            in_stock,
            pages,
            publisher: publisher.to_string(),
        }
    }

    /// Shape check applied before anything is written.
    ///
    /// # Errors
    /// Returns a human-readable reason for the first violated rule.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in [
            (fields::TITLE, &self.title),
            (fields::AUTHOR, &self.author),
            (fields::GENRE, &self.genre),
            (fields::PUBLISHER, &self.publisher),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{name} must not be blank"));
            }
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("price must be a non-negative number, got {}", self.price));
        }
        if self.pages <= 0 {
            return Err(format!("pages must be positive, got {}", self.pages));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_document(&self) -> BsonDocument {
        let mut d = doc! {
            fields::TITLE: self.title.as_str(),
            fields::AUTHOR: self.author.as_str(),
            fields::GENRE: self.genre.as_str(),
            fields::PUBLISHED_YEAR: self.published_year,
            fields::PRICE: self.price,
            fields::IN_STOCK: self.in_stock,
            fields::PAGES: self.pages,
            fields::PUBLISHER: self.publisher.as_str(),
        };
        if let Some(id) = self.id {
            d.insert(fields::ID, id);
        }
        d
    }

    /// Decodes a stored document.
    ///
    /// # Errors
    /// `Query` when a required field is missing or has the wrong type.
    pub fn from_document(d: &BsonDocument) -> Result<Self> {
        let id = match d.get(fields::ID) {
            Some(Bson::ObjectId(oid)) => Some(*oid),
            _ => None,
        };
        Ok(Self {
            id,
            title: req_str(d, fields::TITLE)?,
            author: req_str(d, fields::AUTHOR)?,
            genre: req_str(d, fields::GENRE)?,
            published_year: req_i32(d, fields::PUBLISHED_YEAR)?,
            price: req_f64(d, fields::PRICE)?,
            in_stock: req_bool(d, fields::IN_STOCK)?,
            pages: req_i32(d, fields::PAGES)?,
            publisher: req_str(d, fields::PUBLISHER)?,
        })
    }
}

/// A projected record: only the requested fields are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialBook {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
}

impl PartialBook {
    /// Lenient decode: fields that are absent or mistyped stay `None`.
    #[must_use]
    pub fn from_document(d: &BsonDocument) -> Self {
        Self {
            title: opt_str(d, fields::TITLE),
            author: opt_str(d, fields::AUTHOR),
            genre: opt_str(d, fields::GENRE),
            published_year: opt_i32(d, fields::PUBLISHED_YEAR),
            price: d.get(fields::PRICE).and_then(as_f64),
            in_stock: match d.get(fields::IN_STOCK) {
                Some(Bson::Boolean(b)) => Some(*b),
                _ => None,
            },
            pages: opt_i32(d, fields::PAGES),
            publisher: opt_str(d, fields::PUBLISHER),
        }
    }
}

fn malformed(field: &str) -> BookstoreError {
    BookstoreError::Query(format!("malformed record: missing or invalid `{field}`"))
}

fn opt_str(d: &BsonDocument, field: &str) -> Option<String> {
    match d.get(field) {
        Some(Bson::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn opt_i32(d: &BsonDocument, field: &str) -> Option<i32> {
    match d.get(field) {
        Some(Bson::Int32(i)) => Some(*i),
        Some(Bson::Int64(i)) => i32::try_from(*i).ok(),
        #[allow(clippy::cast_possible_truncation)]
        Some(Bson::Double(f)) if f.fract() == 0.0 && f.abs() <= f64::from(i32::MAX) => Some(*f as i32),
        _ => None,
    }
}

fn req_str(d: &BsonDocument, field: &str) -> Result<String> {
    opt_str(d, field).ok_or_else(|| malformed(field))
}

fn req_i32(d: &BsonDocument, field: &str) -> Result<i32> {
    opt_i32(d, field).ok_or_else(|| malformed(field))
}

fn req_f64(d: &BsonDocument, field: &str) -> Result<f64> {
    d.get(field).and_then(as_f64).ok_or_else(|| malformed(field))
}

fn req_bool(d: &BsonDocument, field: &str) -> Result<bool> {
    match d.get(field) {
        Some(Bson::Boolean(b)) => Ok(*b),
        _ => Err(malformed(field)),
    }
}

/// The fixed catalogue loaded by `bookstore seed`.
#[must_use]
pub fn sample_books() -> Vec<Book> {
    vec![
        Book::new("The Great Gatsby", "F. Scott Fitzgerald", "Classic", 1925, 12.99, true, 180, "Scribner"),
        Book::new("To Kill a Mockingbird", "Harper Lee", "Fiction", 1960, 14.99, true, 281, "J.B. Lippincott & Co."),
        Book::new("1984", "George Orwell", "Dystopian", 1949, 10.99, false, 328, "Secker & Warburg"),
        Book::new("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937, 16.99, true, 310, "George Allen & Unwin"),
        Book::new(
            "Harry Potter and the Philosopher's Stone",
            "J.K. Rowling",
            "Fantasy",
            1997,
            19.99,
            true,
            223,
            "Bloomsbury",
        ),
        Book::new("The Da Vinci Code", "Dan Brown", "Mystery", 2003, 15.99, false, 489, "Doubleday"),
        Book::new("The Alchemist", "Paulo Coelho", "Fiction", 1988, 13.99, true, 208, "HarperTorch"),
        Book::new("The Hunger Games", "Suzanne Collins", "Dystopian", 2008, 17.99, true, 374, "Scholastic"),
        Book::new("Dune", "Frank Herbert", "Science Fiction", 1965, 14.99, true, 412, "Chilton Books"),
        Book::new("The Martian", "Andy Weir", "Science Fiction", 2011, 18.99, true, 369, "Crown"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_round_trip_keeps_field_types() {
        let b = sample_books().remove(0);
        let d = b.to_document();
        assert!(matches!(d.get(fields::PUBLISHED_YEAR), Some(Bson::Int32(1925))));
        assert!(matches!(d.get(fields::PRICE), Some(Bson::Double(_))));
        assert!(d.get(fields::ID).is_none());
        assert_eq!(Book::from_document(&d).unwrap(), b);
    }

    #[test]
    fn decode_accepts_wide_numbers_and_rejects_missing_fields() {
        let mut d = sample_books()[1].to_document();
        d.insert(fields::PAGES, Bson::Int64(281));
        d.insert(fields::PRICE, Bson::Int32(15));
        let b = Book::from_document(&d).unwrap();
        assert_eq!(b.pages, 281);
        assert_eq!(b.price, 15.0);

        d.remove(fields::AUTHOR);
        let err = Book::from_document(&d).unwrap_err();
        assert!(matches!(err, BookstoreError::Query(m) if m.contains("author")));
    }

    #[test]
    fn validate_rejects_bad_shapes() {
        let mut b = sample_books().remove(2);
        assert!(b.validate().is_ok());
        b.title = "  ".into();
        assert!(b.validate().unwrap_err().contains("title"));
        b.title = "1984".into();
        b.price = f64::NAN;
        assert!(b.validate().unwrap_err().contains("price"));
        b.price = 1.0;
        b.pages = 0;
        assert!(b.validate().unwrap_err().contains("pages"));
    }

    #[test]
    fn partial_book_only_has_projected_fields() {
        let d = doc! { "title": "Dune", "price": 14.99 };
        let p = PartialBook::from_document(&d);
        assert_eq!(p.title.as_deref(), Some("Dune"));
        assert_eq!(p.price, Some(14.99));
        assert!(p.author.is_none());
        assert!(p.pages.is_none());
    }
}
