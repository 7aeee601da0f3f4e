//! Optional admin HTTP surface (supplemental, not in the wire protocol):
//! `GET /healthz` and `GET /ledger/:resource_id`, read-only, never
//! accepting scheduling requests. Bound only when the caller opts in to
//! `--daemon-http`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::json;

use crate::ledger::WindowLedger;

/// Builds the admin router over a shared ledger handle.
pub fn router(ledger: Arc<WindowLedger>) -> Router {
    Router::new().route("/healthz", get(healthz)).route("/ledger/{resource_id}", get(ledger_entry_count)).with_state(ledger)
}

async fn healthz(State(ledger): State<Arc<WindowLedger>>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "total_entries": ledger.total_entries() }))
}

async fn ledger_entry_count(State(ledger): State<Arc<WindowLedger>>, Path(resource_id): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "resource_id": resource_id, "entries": ledger.resource_entry_count(&resource_id) }))
}
