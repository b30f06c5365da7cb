use crate::acl::repo_types::{normalize_id, UserRecord, USERS_TABLE};
use crate::error::{EvaluationError, StoreError};
use crate::identity::IdentityAssertion;
use crate::rowstore::{Row, RowStore};

impl UserRecord {
    /// Find the row for an email. Decode failures are reported separately
    /// from transport failures.
    pub async fn find_by_email(
        store: &dyn RowStore,
        email: &str,
        identity: Option<&IdentityAssertion>,
    ) -> Result<Option<UserRecord>, EvaluationError> {
        let id = normalize_id(email);
        let Some(row) = store.get(USERS_TABLE, &id, identity).await? else {
            return Ok(None);
        };
        let mut rec: UserRecord = serde_json::from_value(row.into())?;
        if rec.email.is_empty() {
            rec.email = email.trim().to_string();
        }
        if rec.id.is_empty() {
            rec.id = id;
        }
        Ok(Some(rec))
    }

    /// Upsert this record under its normalized id.
    pub async fn save(
        &self,
        store: &dyn RowStore,
        identity: Option<&IdentityAssertion>,
    ) -> Result<(), StoreError> {
        store.upsert(USERS_TABLE, self.to_row()?, identity).await
    }

    pub async fn delete_by_email(
        store: &dyn RowStore,
        email: &str,
        identity: Option<&IdentityAssertion>,
    ) -> Result<(), StoreError> {
        store.delete(USERS_TABLE, &normalize_id(email), identity).await
    }

    /// Every user row; a row that fails to decode is logged and skipped.
    pub async fn list(
        store: &dyn RowStore,
        identity: Option<&IdentityAssertion>,
    ) -> Result<Vec<UserRecord>, StoreError> {
        let rows = store.list(USERS_TABLE, identity).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<UserRecord>(row.into()) {
                Ok(rec) => Some(rec),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable user row");
                    None
                }
            })
            .collect())
    }

    pub fn to_row(&self) -> Result<Row, StoreError> {
        let mut rec = self.clone();
        if !rec.email.is_empty() {
            rec.id = normalize_id(&rec.email);
        }
        match serde_json::to_value(rec)? {
            serde_json::Value::Object(row) => Ok(row),
            _ => Err(StoreError::MissingId),
        }
    }
}
