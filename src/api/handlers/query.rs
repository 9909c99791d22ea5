use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use super::dispatch_error;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::dispatch::{QueryAnswer, QueryRequest};
use crate::AppState;

pub async fn query_files(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<QueryRequest>,
) -> Result<Json<JSend<QueryAnswer>>, ApiError> {
    let answer = state
        .dispatcher
        .dispatch(req)
        .await
        .map_err(dispatch_error)?;

    Ok(JSend::success(answer))
}
