//! Generic keyed row storage reached over `/api/db/rows/<table>/<id>`.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::identity::IdentityAssertion;

pub mod handlers;
pub mod http;
pub mod memory;

pub use http::HttpRowStore;
pub use memory::MemoryRowStore;

/// One row: a JSON object keyed by its `id` field.
pub type Row = Map<String, Value>;

/// CRUD over keyed rows. The identity assertion is forwarded as-is; its
/// absence is the server's business, not ours.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// `Ok(None)` when the row does not exist.
    async fn get(
        &self,
        table: &str,
        id: &str,
        identity: Option<&IdentityAssertion>,
    ) -> Result<Option<Row>, StoreError>;

    /// Update by id, creating the row when it does not exist yet.
    async fn upsert(
        &self,
        table: &str,
        row: Row,
        identity: Option<&IdentityAssertion>,
    ) -> Result<(), StoreError>;

    /// Deleting a missing row succeeds.
    async fn delete(
        &self,
        table: &str,
        id: &str,
        identity: Option<&IdentityAssertion>,
    ) -> Result<(), StoreError>;

    async fn list(
        &self,
        table: &str,
        identity: Option<&IdentityAssertion>,
    ) -> Result<Vec<Row>, StoreError>;
}

pub(crate) fn row_id(row: &Row) -> Result<&str, StoreError> {
    row.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(StoreError::MissingId)
}
