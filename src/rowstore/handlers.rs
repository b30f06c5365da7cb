use std::sync::Arc;

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{memory::MemoryRowStore, Row};
use crate::identity::extractors::{Caller, IdentityGate};

/// Request body of create and update: `{ "data": { ... } }`.
#[derive(Debug, Deserialize)]
pub struct RowEnvelope {
    pub data: Row,
}

#[derive(Clone)]
struct RowsState {
    store: Arc<MemoryRowStore>,
    gate: IdentityGate,
}

impl FromRef<RowsState> for Arc<MemoryRowStore> {
    fn from_ref(state: &RowsState) -> Self {
        state.store.clone()
    }
}

impl FromRef<RowsState> for IdentityGate {
    fn from_ref(state: &RowsState) -> Self {
        state.gate.clone()
    }
}

/// The row store HTTP surface served from memory. Callers go through the
/// same identity gate as the rest of the gateway.
pub fn router<S>(store: Arc<MemoryRowStore>, gate: IdentityGate) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/api/db/rows/:table", get(list_rows).post(create_row))
        .route(
            "/api/db/rows/:table/:id",
            get(get_row).put(update_row).delete(delete_row),
        )
        .with_state(RowsState { store, gate })
}

#[instrument(skip(store, caller), fields(caller = %caller.email()))]
async fn list_rows(
    State(store): State<Arc<MemoryRowStore>>,
    caller: Caller,
    Path(table): Path<String>,
) -> Json<Vec<Row>> {
    Json(store.rows(&table).await)
}

#[instrument(skip(store, caller), fields(caller = %caller.email()))]
async fn get_row(
    State(store): State<Arc<MemoryRowStore>>,
    caller: Caller,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<Row>, (StatusCode, String)> {
    store
        .fetch(&table, &id)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "row not found".into()))
}

#[instrument(skip(store, caller, body), fields(caller = %caller.email()))]
async fn create_row(
    State(store): State<Arc<MemoryRowStore>>,
    caller: Caller,
    Path(table): Path<String>,
    Json(body): Json<RowEnvelope>,
) -> Result<(StatusCode, Json<Row>), (StatusCode, String)> {
    let Some(id) = body.data.get("id").and_then(Value::as_str).map(str::to_string) else {
        warn!(%table, "create without id");
        return Err((StatusCode::BAD_REQUEST, "data.id is required".into()));
    };
    if !store.create(&table, &id, body.data.clone()).await {
        return Err((StatusCode::CONFLICT, "row already exists".into()));
    }
    debug!(%table, %id, "row created");
    Ok((StatusCode::CREATED, Json(body.data)))
}

#[instrument(skip(store, caller, body), fields(caller = %caller.email()))]
async fn update_row(
    State(store): State<Arc<MemoryRowStore>>,
    caller: Caller,
    Path((table, id)): Path<(String, String)>,
    Json(body): Json<RowEnvelope>,
) -> Result<Json<Row>, (StatusCode, String)> {
    let mut row = body.data;
    row.insert("id".into(), Value::String(id.clone()));
    if !store.replace(&table, &id, row.clone()).await {
        return Err((StatusCode::NOT_FOUND, "row not found".into()));
    }
    debug!(%table, %id, "row updated");
    Ok(Json(row))
}

#[instrument(skip(store, caller), fields(caller = %caller.email()))]
async fn delete_row(
    State(store): State<Arc<MemoryRowStore>>,
    caller: Caller,
    Path((table, id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    if store.remove(&table, &id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "row not found".into()))
    }
}
