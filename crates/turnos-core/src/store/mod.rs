//! Document store client.
//!
//! [`DocumentStore`] is the seam to the document database: the controller
//! and uniqueness checker only ever talk to this trait. [`SqliteStore`] is
//! the bundled local implementation.

mod sqlite;

pub use sqlite::*;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::db::{DbError, SortDirection};

/// Untyped document body as exchanged with the store.
pub type Fields = Map<String, Value>;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Invalid document {id}: {reason}")]
    InvalidDocument { id: String, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A document together with its store-assigned identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Collection ordering for [`DocumentStore::get_all_records`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Operations consumed from the document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document and return its new identifier.
    async fn create_record(&self, collection: &str, fields: Fields) -> StoreResult<String>;

    /// Read every document in a collection, optionally ordered.
    async fn get_all_records(
        &self,
        collection: &str,
        order_by: Option<OrderBy>,
    ) -> StoreResult<Vec<Document>>;

    /// Read the documents whose `field` equals `value`.
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>>;

    /// Merge `fields` into an existing document. Missing ids are an error.
    async fn update_record(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Delete a document. Deleting a missing id succeeds.
    async fn delete_record(&self, collection: &str, id: &str) -> StoreResult<()>;
}
