//! Axum endpoint for the GraphQL schema

use async_graphql::{Request, Response};
use axum::{extract::Extension, http::HeaderMap, routing::post, Json, Router};
use tracing::Instrument;
use uuid::Uuid;

use crate::schema::{build_schema, AppSchema, AppState};

/// Extract the caller's request id from the x-request-id header
pub fn extract_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Execute one GraphQL request.
///
/// Errors never escape as HTTP failures; they are reported in the response's
/// `errors` list with an `extensions.code`.
pub async fn graphql_handler(
    Extension(schema): Extension<AppSchema>,
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(request): Json<Request>,
) -> Json<Response> {
    let request_id = extract_request_id(&headers).unwrap_or_else(|| Uuid::new_v4().to_string());
    let span = tracing::info_span!("graphql", request_id = %request_id);

    let response = schema
        .execute(state.prepare(request))
        .instrument(span.clone())
        .await;

    if response.is_err() {
        span.in_scope(|| {
            tracing::warn!(errors = response.errors.len(), "request completed with errors");
        });
    }

    Json(response)
}

/// Router serving the schema at `/graphql`
pub fn router(state: AppState) -> Router {
    let schema = build_schema(state.clone());
    Router::new()
        .route("/graphql", post(graphql_handler))
        .layer(Extension(schema))
        .layer(Extension(state))
}
