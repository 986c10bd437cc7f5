pub mod api;

pub use api::{create_api_routes, create_ws_routes};

use std::sync::Arc;
use axum::{http::{HeaderValue, Method}, Router};
use tower::ServiceBuilder;
use tower_http::{cors::{AllowOrigin, CorsLayer}, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{AppState, config::Config, docs::ApiDoc};

/// The full relay application: JSON API, document sockets and Swagger UI.
pub fn create_app(app_state: Arc<AppState>, config: &Config) -> Router {
    Router::new()
        // Mount API routes
        .nest("/api", create_api_routes(app_state.clone()))
        // Mount the document relay
        .merge(create_ws_routes(app_state))
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config)),
        )
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origin_list()
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    if !origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET]);
    }
    if config.is_development() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}
