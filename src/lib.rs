//! Typed query and aggregation facade over a MongoDB `books` collection.
//!
//! [`seeder::reset_and_load`] fills the collection, [`Bookstore`] runs the
//! queries and aggregations, and [`report`] formats their results.

pub mod book;
pub mod cli;
pub mod config;
pub mod errors;
pub mod facade;
pub mod logger;
pub mod query;
pub mod report;
pub mod seeder;
pub mod store;

pub use book::{Book, PartialBook, sample_books};
pub use errors::{BookstoreError, Result};
pub use facade::Bookstore;
pub use store::{DocumentStore, MemoryStore, MongoStore};
