//! SQLite-backed document store.

use std::path::Path;

use async_trait::async_trait;

use super::{Document, DocumentStore, Fields, OrderBy, StoreError, StoreResult};
use crate::db::{with_blocking, Database, SharedDatabase, StoredDocument};

/// [`DocumentStore`] over the local SQLite `documents` table.
///
/// Every call runs on the blocking pool, so a tokio runtime must be active.
#[derive(Clone)]
pub struct SqliteStore {
    db: SharedDatabase,
}

impl SqliteStore {
    /// Wrap an already shared connection.
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Open a database file, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self::new(Database::open(path)?.into_shared()))
    }

    /// In-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(Database::open_in_memory()?.into_shared()))
    }

    /// The underlying connection handle.
    pub fn database(&self) -> SharedDatabase {
        self.db.clone()
    }
}

impl From<StoredDocument> for Document {
    fn from(doc: StoredDocument) -> Self {
        Document {
            id: doc.id,
            fields: doc.data,
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create_record(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let collection = collection.to_string();
        let doc_id = id.clone();

        with_blocking(&self.db, move |db| db.insert_document(&collection, &doc_id, &fields))
            .await?;

        tracing::debug!(%id, "document created");
        Ok(id)
    }

    async fn get_all_records(
        &self,
        collection: &str,
        order_by: Option<OrderBy>,
    ) -> StoreResult<Vec<Document>> {
        let collection = collection.to_string();

        let docs = with_blocking(&self.db, move |db| {
            let order = order_by
                .as_ref()
                .map(|order| (order.field.as_str(), order.direction));
            db.list_documents(&collection, order)
        })
        .await?;

        Ok(docs.into_iter().map(Document::from).collect())
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>> {
        let collection = collection.to_string();
        let field = field.to_string();
        let value = value.to_string();

        let docs = with_blocking(&self.db, move |db| {
            db.find_documents_by_field(&collection, &field, &value)
        })
        .await?;

        Ok(docs.into_iter().map(Document::from).collect())
    }

    async fn update_record(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        let owned_collection = collection.to_string();
        let owned_id = id.to_string();

        let updated = with_blocking(&self.db, move |db| {
            db.update_document(&owned_collection, &owned_id, &fields)
        })
        .await?;

        if !updated {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_record(&self, collection: &str, id: &str) -> StoreResult<()> {
        let collection = collection.to_string();
        let owned_id = id.to_string();

        let deleted =
            with_blocking(&self.db, move |db| db.delete_document(&collection, &owned_id)).await?;
        if !deleted {
            tracing::debug!(%id, "delete of missing document ignored");
        }
        Ok(())
    }
}
