use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Relay is accepting connections", body = ReadyResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

/// Relay diagnostics
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (
            status = 200,
            description = "Open rooms, connections and process stats",
            body = DiagnosticsResponse
        )
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// Document session socket
#[utoipa::path(
    get,
    path = "/ws/docs/{document_id}",
    params(
        ("document_id" = String, Path, description = "Document to join"),
        (
            "user_name" = Option<String>,
            Query,
            description = "Display name of the connecting participant"
        )
    ),
    responses(
        (status = 101, description = "Switching to the WebSocket session protocol"),
        (status = 400, description = "Invalid document id", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn document_socket_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        diagnostics_doc,
        document_socket_doc,
    ),
    components(
        schemas(HealthResponse, ReadyResponse, DiagnosticsResponse, ErrorResponse)
    ),
    tags(
        (name = "api", description = "Relay endpoints")
    )
)]
pub struct ApiDoc;
