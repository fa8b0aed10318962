//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

use axum::routing::get;
use axum::Json;
use axum::Router;
use serde_json::json;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ApplicationHealthState": "Healthy" }))
}

/// Builds the dispatcher's router: a fixed health-check route plus a
/// catch-all fallback carrying every confsec request, regardless of path.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/_health", get(health))
        .fallback(handlers::dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
