use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::{row_id, Row, RowStore};
use crate::error::StoreError;
use crate::identity::{IdentityAssertion, IDENTITY_HEADER};

/// Row store client over the `/api/db/rows` HTTP surface.
#[derive(Clone)]
pub struct HttpRowStore {
    client: Client,
    base_url: Url,
}

impl HttpRowStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let base_url =
            Url::parse(base_url).map_err(|e| StoreError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn rows_url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "db", "rows"])
            .extend(segments);
        Ok(url)
    }

    fn with_identity(
        req: RequestBuilder,
        identity: Option<&IdentityAssertion>,
    ) -> Result<RequestBuilder, StoreError> {
        Ok(match identity {
            Some(identity) => req.header(IDENTITY_HEADER, identity.header_value()?),
            None => req,
        })
    }
}

async fn failure(resp: Response) -> StoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    warn!(%status, "row store request failed");
    StoreError::Status { status, body }
}

#[async_trait]
impl RowStore for HttpRowStore {
    #[instrument(skip(self, identity))]
    async fn get(
        &self,
        table: &str,
        id: &str,
        identity: Option<&IdentityAssertion>,
    ) -> Result<Option<Row>, StoreError> {
        let url = self.rows_url(&[table, id])?;
        let resp = Self::with_identity(self.client.get(url), identity)?
            .send()
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let bytes = resp.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            _ => Err(failure(resp).await),
        }
    }

    #[instrument(skip(self, row, identity))]
    async fn upsert(
        &self,
        table: &str,
        row: Row,
        identity: Option<&IdentityAssertion>,
    ) -> Result<(), StoreError> {
        let id = row_id(&row)?.to_string();
        let body = json!({ "data": row });

        let resp = Self::with_identity(self.client.put(self.rows_url(&[table, &id])?), identity)?
            .json(&body)
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => return Ok(()),
            StatusCode::NOT_FOUND => debug!(%id, "row absent, creating"),
            _ => return Err(failure(resp).await),
        }

        let resp = Self::with_identity(self.client.post(self.rows_url(&[table])?), identity)?
            .json(&body)
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(failure(resp).await)
        }
    }

    #[instrument(skip(self, identity))]
    async fn delete(
        &self,
        table: &str,
        id: &str,
        identity: Option<&IdentityAssertion>,
    ) -> Result<(), StoreError> {
        let url = self.rows_url(&[table, id])?;
        let resp = Self::with_identity(self.client.delete(url), identity)?
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            _ => Err(failure(resp).await),
        }
    }

    #[instrument(skip(self, identity))]
    async fn list(
        &self,
        table: &str,
        identity: Option<&IdentityAssertion>,
    ) -> Result<Vec<Row>, StoreError> {
        let url = self.rows_url(&[table])?;
        let resp = Self::with_identity(self.client.get(url), identity)?
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(failure(resp).await);
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
