use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{row_id, Row, RowStore};
use crate::error::StoreError;
use crate::identity::IdentityAssertion;

/// Row store held in process memory. Backs the development server and tests.
#[derive(Default)]
pub struct MemoryRowStore {
    tables: RwLock<HashMap<String, BTreeMap<String, Row>>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetch(&self, table: &str, id: &str) -> Option<Row> {
        let tables = self.tables.read().await;
        tables.get(table).and_then(|t| t.get(id)).cloned()
    }

    /// Insert a new row; `false` if the id is already taken.
    pub async fn create(&self, table: &str, id: &str, row: Row) -> bool {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(id) {
            return false;
        }
        rows.insert(id.to_string(), row);
        true
    }

    /// Replace an existing row; `false` if there is nothing to replace.
    pub async fn replace(&self, table: &str, id: &str, row: Row) -> bool {
        let mut tables = self.tables.write().await;
        match tables.get_mut(table).and_then(|t| t.get_mut(id)) {
            Some(slot) => {
                *slot = row;
                true
            }
            None => false,
        }
    }

    /// Insert or overwrite under a single write lock. `true` if a row was
    /// replaced.
    pub async fn put(&self, table: &str, id: &str, row: Row) -> bool {
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), row)
            .is_some()
    }

    /// `false` if the row was not there.
    pub async fn remove(&self, table: &str, id: &str) -> bool {
        let mut tables = self.tables.write().await;
        tables
            .get_mut(table)
            .map(|t| t.remove(id).is_some())
            .unwrap_or(false)
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn get(
        &self,
        table: &str,
        id: &str,
        _identity: Option<&IdentityAssertion>,
    ) -> Result<Option<Row>, StoreError> {
        Ok(self.fetch(table, id).await)
    }

    async fn upsert(
        &self,
        table: &str,
        row: Row,
        _identity: Option<&IdentityAssertion>,
    ) -> Result<(), StoreError> {
        let id = row_id(&row)?.to_string();
        if !self.put(table, &id, row).await {
            debug!(%table, %id, "memory upsert created row");
        }
        Ok(())
    }

    async fn delete(
        &self,
        table: &str,
        id: &str,
        _identity: Option<&IdentityAssertion>,
    ) -> Result<(), StoreError> {
        self.remove(table, id).await;
        Ok(())
    }

    async fn list(
        &self,
        table: &str,
        _identity: Option<&IdentityAssertion>,
    ) -> Result<Vec<Row>, StoreError> {
        Ok(self.rows(table).await)
    }
}

#[cfg(test)]
mod memory_tests {
    use super::*;
    use serde_json::json;

    fn row(v: serde_json::Value) -> Row {
        v.as_object().cloned().expect("object")
    }

    #[tokio::test]
    async fn upsert_twice_equals_upsert_once() {
        let once = MemoryRowStore::new();
        let twice = MemoryRowStore::new();
        let r = row(json!({ "id": "a-b-com", "email": "a@b.com", "admin": false }));

        once.upsert("users", r.clone(), None).await.unwrap();
        twice.upsert("users", r.clone(), None).await.unwrap();
        twice.upsert("users", r, None).await.unwrap();

        assert_eq!(once.rows("users").await, twice.rows("users").await);
        assert_eq!(twice.rows("users").await.len(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_fields() {
        let store = MemoryRowStore::new();
        store
            .upsert("users", row(json!({ "id": "x", "admin": false })), None)
            .await
            .unwrap();
        store
            .upsert("users", row(json!({ "id": "x", "admin": true })), None)
            .await
            .unwrap();
        let got = store.get("users", "x", None).await.unwrap().unwrap();
        assert_eq!(got["admin"], json!(true));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryRowStore::new();
        store
            .upsert("users", row(json!({ "id": "x" })), None)
            .await
            .unwrap();
        store.delete("users", "x", None).await.unwrap();
        store.delete("users", "x", None).await.unwrap();
        store.delete("nothing-here", "x", None).await.unwrap();
        assert!(store.get("users", "x", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_without_id_is_rejected() {
        let store = MemoryRowStore::new();
        let err = store
            .upsert("users", row(json!({ "email": "a@b.com" })), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingId));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_upserts_never_drop_a_write() {
        let store = std::sync::Arc::new(MemoryRowStore::new());
        let mut tasks = Vec::new();
        for n in 0..32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let r = row(json!({ "id": format!("u{}", n % 4), "writer": n }));
                store.upsert("users", r, None).await.unwrap();
                n
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let rows = store.rows("users").await;
        assert_eq!(rows.len(), 4);
        for r in rows {
            assert!(r["writer"].is_number());
        }
    }

    #[tokio::test]
    async fn put_reports_whether_it_replaced() {
        let store = MemoryRowStore::new();
        assert!(!store.put("users", "x", Row::new()).await);
        assert!(store.put("users", "x", Row::new()).await);
        assert_eq!(store.rows("users").await.len(), 1);
    }

    #[tokio::test]
    async fn create_refuses_taken_id() {
        let store = MemoryRowStore::new();
        assert!(store.create("users", "x", Row::new()).await);
        assert!(!store.create("users", "x", Row::new()).await);
        assert!(!store.replace("users", "y", Row::new()).await);
    }
}
