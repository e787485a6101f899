//! Document database operations.

use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};

use super::{Database, DbError, DbResult};

/// Sort direction for collection listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// A document row as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// Raw row before the JSON body is decoded.
struct DocumentRow {
    id: String,
    data: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<DocumentRow> for StoredDocument {
    type Error = DbError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(StoredDocument {
            id: row.id,
            data: serde_json::from_str(&row.data)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        data: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

/// JSON path for a top-level document key.
///
/// Only plain identifiers are accepted so the path cannot address nested or
/// quoted members.
fn field_path(field: &str) -> DbResult<String> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(DbError::Constraint(format!("invalid field name: {:?}", field)));
    }
    Ok(format!("$.{}", field))
}

impl Database {
    /// Insert a new document.
    pub fn insert_document(
        &self,
        collection: &str,
        id: &str,
        data: &Map<String, Value>,
    ) -> DbResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let data_json = serde_json::to_string(data)?;

        self.conn.execute(
            r#"
            INSERT INTO documents (collection, id, data, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![collection, id, data_json, now, now],
        )?;
        Ok(())
    }

    /// Merge fields into an existing document.
    ///
    /// Keys present in `data` overwrite stored values; other keys are kept.
    pub fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: &Map<String, Value>,
    ) -> DbResult<bool> {
        let patch_json = serde_json::to_string(data)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE documents SET
                data = json_patch(data, ?3),
                updated_at = ?4
            WHERE collection = ?1 AND id = ?2
            "#,
            params![collection, id, patch_json, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a document by ID.
    pub fn get_document(&self, collection: &str, id: &str) -> DbResult<Option<StoredDocument>> {
        self.conn
            .query_row(
                r#"
                SELECT id, data, created_at, updated_at
                FROM documents
                WHERE collection = ?1 AND id = ?2
                "#,
                params![collection, id],
                map_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List every document in a collection.
    ///
    /// Without an ordering, documents come back in insertion order. Ordering
    /// compares the raw JSON values, so string fields sort lexicographically.
    pub fn list_documents(
        &self,
        collection: &str,
        order_by: Option<(&str, SortDirection)>,
    ) -> DbResult<Vec<StoredDocument>> {
        let rows = match order_by {
            Some((field, direction)) => {
                let path = field_path(field)?;
                let sql = format!(
                    r#"
                    SELECT id, data, created_at, updated_at
                    FROM documents
                    WHERE collection = ?1
                    ORDER BY json_extract(data, ?2) {}, rowid
                    "#,
                    direction.as_sql()
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![collection, path], map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    r#"
                    SELECT id, data, created_at, updated_at
                    FROM documents
                    WHERE collection = ?1
                    ORDER BY rowid
                    "#,
                )?;
                let rows = stmt.query_map([collection], map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        rows.into_iter().map(StoredDocument::try_from).collect()
    }

    /// Find documents whose top-level `field` equals `value` exactly.
    pub fn find_documents_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> DbResult<Vec<StoredDocument>> {
        let path = field_path(field)?;
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, data, created_at, updated_at
            FROM documents
            WHERE collection = ?1 AND json_extract(data, ?2) = ?3
            ORDER BY rowid
            "#,
        )?;

        let rows = stmt.query_map(params![collection, path, value], map_row)?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?.try_into()?);
        }
        Ok(documents)
    }

    /// Delete a document.
    pub fn delete_document(&self, collection: &str, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Count documents in a collection.
    pub fn count_documents(&self, collection: &str) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        db.insert_document("users", "a1", &body(json!({"name": "Ana", "ficha": "10"})))
            .unwrap();

        let doc = db.get_document("users", "a1").unwrap().unwrap();
        assert_eq!(doc.id, "a1");
        assert_eq!(doc.data["name"], "Ana");
        assert!(!doc.created_at.is_empty());

        // Same id in another collection is a different document
        assert!(db.get_document("doctors", "a1").unwrap().is_none());
    }

    #[test]
    fn test_update_merges_fields() {
        let db = setup_db();

        db.insert_document("users", "a1", &body(json!({"name": "Ana", "ficha": "10"})))
            .unwrap();
        let updated = db
            .update_document("users", "a1", &body(json!({"ficha": "11"})))
            .unwrap();
        assert!(updated);

        let doc = db.get_document("users", "a1").unwrap().unwrap();
        assert_eq!(doc.data["name"], "Ana");
        assert_eq!(doc.data["ficha"], "11");

        let missing = db
            .update_document("users", "nope", &body(json!({"ficha": "1"})))
            .unwrap();
        assert!(!missing);
    }

    #[test]
    fn test_list_ordered_by_field() {
        let db = setup_db();

        db.insert_document("users", "a", &body(json!({"ficha": "30"}))).unwrap();
        db.insert_document("users", "b", &body(json!({"ficha": "10"}))).unwrap();
        db.insert_document("users", "c", &body(json!({"ficha": "20"}))).unwrap();

        let ids = |docs: Vec<StoredDocument>| docs.into_iter().map(|d| d.id).collect::<Vec<_>>();

        let unordered = db.list_documents("users", None).unwrap();
        assert_eq!(ids(unordered), vec!["a", "b", "c"]);

        let asc = db
            .list_documents("users", Some(("ficha", SortDirection::Ascending)))
            .unwrap();
        assert_eq!(ids(asc), vec!["b", "c", "a"]);

        let desc = db
            .list_documents("users", Some(("ficha", SortDirection::Descending)))
            .unwrap();
        assert_eq!(ids(desc), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_find_by_field() {
        let db = setup_db();

        db.insert_document("users", "a", &body(json!({"ficha": "10", "obraSocial": "OSDE"})))
            .unwrap();
        db.insert_document("users", "b", &body(json!({"ficha": "20", "obraSocial": "OSDE"})))
            .unwrap();

        assert_eq!(db.find_documents_by_field("users", "ficha", "10").unwrap().len(), 1);
        assert_eq!(
            db.find_documents_by_field("users", "obraSocial", "OSDE").unwrap().len(),
            2
        );
        assert!(db.find_documents_by_field("users", "ficha", "99").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_field_name_rejected() {
        let db = setup_db();

        let result = db.find_documents_by_field("users", "name') OR 1=1 --", "x");
        assert!(matches!(result, Err(DbError::Constraint(_))));

        let result = db.list_documents("users", Some(("a.b", SortDirection::Ascending)));
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_delete_document() {
        let db = setup_db();

        db.insert_document("users", "a", &body(json!({"ficha": "10"}))).unwrap();
        assert_eq!(db.count_documents("users").unwrap(), 1);

        assert!(db.delete_document("users", "a").unwrap());
        assert!(!db.delete_document("users", "a").unwrap());
        assert_eq!(db.count_documents("users").unwrap(), 0);
    }
}
