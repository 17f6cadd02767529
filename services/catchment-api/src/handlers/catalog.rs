//! Scenario and column listings.

use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::Response};
use catchment_engine::ColumnInfo;
use serde::Serialize;

use super::common::json_response;
use crate::state::AppState;

#[derive(Serialize)]
struct ScenariosResponse<'a> {
    scenarios: &'a [String],
}

#[derive(Serialize)]
struct ColumnsResponse {
    columns: Vec<ColumnInfo>,
}

/// GET /api/scenarios
pub async fn scenarios_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    json_response(
        StatusCode::OK,
        &ScenariosResponse {
            scenarios: state.engine.list_scenarios(),
        },
    )
}

/// GET /api/columns - every valid column with its value domain
pub async fn columns_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    json_response(
        StatusCode::OK,
        &ColumnsResponse {
            columns: state.engine.column_domains(),
        },
    )
}
