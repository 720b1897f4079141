use crate::errors::AppError;
use crate::export;
use crate::models::*;
use crate::orchestrator::{Orchestrator, ScrapePhase, SessionStatus, ANONYMOUS_SESSION};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use utoipa::OpenApi;

/// Header carrying the client session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Runs scrapes and keeps per-session results.
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(OpenApi)]
#[openapi(
    paths(scrape, scrape_status, export_last, export_leads),
    components(schemas(
        Lead,
        LeadStats,
        ScrapeRequest,
        ScrapeResponse,
        ExportRequest,
        ErrorBody,
        SessionStatus,
        ScrapePhase
    )),
    tags((name = "leads", description = "Lead scraping and CSV export"))
)]
pub struct ApiDoc;

/// API routes. Callers add `/health`, middleware and state.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.json", get(serve_openapi_spec))
        .route("/api/v1/scrape", post(scrape))
        .route("/api/v1/scrape/status", get(scrape_status))
        .route("/api/v1/export", get(export_last).post(export_leads))
}

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_SESSION)
        .to_string()
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-scraper-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/scrape
///
/// Runs a scrape for the caller's session and returns the deduplicated leads
/// with their summary counts.
#[utoipa::path(
    post,
    path = "/api/v1/scrape",
    tag = "leads",
    request_body = ScrapeRequest,
    params(("x-session-id" = Option<String>, Header, description = "Client session id")),
    responses(
        (status = 200, description = "Scrape finished", body = ScrapeResponse),
        (status = 400, description = "Empty query or invalid maxResults", body = ErrorBody),
        (status = 409, description = "A scrape is already running for this session", body = ErrorBody),
        (status = 429, description = "Map provider rate limited", body = ErrorBody),
        (status = 502, description = "Map provider failure", body = ErrorBody),
        (status = 504, description = "Scrape timed out", body = ErrorBody)
    )
)]
pub async fn scrape(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Json<ScrapeResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let session = session_id(&headers);
    tracing::info!(
        "POST /scrape - session: {}, query: {:?}",
        session,
        request.query
    );

    let result = state.orchestrator.scrape(&session, request).await?;

    Ok(Json(ScrapeResponse::from(result.as_ref())))
}

/// GET /api/v1/scrape/status
#[utoipa::path(
    get,
    path = "/api/v1/scrape/status",
    tag = "leads",
    params(("x-session-id" = Option<String>, Header, description = "Client session id")),
    responses((status = 200, description = "Session state", body = SessionStatus))
)]
pub async fn scrape_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<SessionStatus> {
    Json(state.orchestrator.status(&session_id(&headers)).await)
}

/// GET /api/v1/export
///
/// Serves the session's last successful result as CSV. A failed scrape does
/// not replace it.
#[utoipa::path(
    get,
    path = "/api/v1/export",
    tag = "leads",
    params(("x-session-id" = Option<String>, Header, description = "Client session id")),
    responses(
        (status = 200, description = "CSV document", content_type = "text/csv", body = String),
        (status = 404, description = "No successful scrape in this session", body = ErrorBody)
    )
)]
pub async fn export_last(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session = session_id(&headers);
    let result = state
        .orchestrator
        .last_result(&session)
        .await
        .ok_or_else(|| AppError::NotFound("No leads to export yet".to_string()))?;

    tracing::info!(
        "GET /export - session: {}, {} leads",
        session,
        result.leads.len()
    );
    csv_response(export::encode(&result.leads)?)
}

/// POST /api/v1/export
///
/// Encodes leads held by the client.
#[utoipa::path(
    post,
    path = "/api/v1/export",
    tag = "leads",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "CSV document", content_type = "text/csv", body = String),
        (status = 400, description = "Malformed body or a lead without name", body = ErrorBody)
    )
)]
pub async fn export_leads(
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if let Some(index) = body.leads.iter().position(|l| l.name.trim().is_empty()) {
        return Err(AppError::BadRequest(format!(
            "Lead at position {} has no name",
            index + 1
        )));
    }

    tracing::info!("POST /export - {} leads", body.leads.len());
    csv_response(export::encode(&body.leads)?)
}

fn csv_response(document: String) -> Result<Response, AppError> {
    let filename = export::export_filename(Utc::now().date_naive());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, export::CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        document,
    )
        .into_response())
}

/// Serves the generated OpenAPI document.
async fn serve_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Serves the Swagger UI HTML page, loading the document from
/// `/api-docs/openapi.json`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Lead Scraper API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_id_defaults_to_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_id(&headers), ANONYMOUS_SESSION);

        headers.insert(SESSION_HEADER, HeaderValue::from_static("  "));
        assert_eq!(session_id(&headers), ANONYMOUS_SESSION);

        headers.insert(SESSION_HEADER, HeaderValue::from_static("tab-42"));
        assert_eq!(session_id(&headers), "tab-42");
    }

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/scrape"));
        assert!(doc.paths.paths.contains_key("/api/v1/export"));
    }
}
