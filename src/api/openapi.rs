//! OpenAPI documentation and schema generation
//!
//! Describes the HTTP surface using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the torrent-dl HTTP surface
///
/// The OpenAPI document is served at:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "torrent-dl HTTP API",
        version = "0.1.0",
        description = "Torrent list snapshot, websocket command channel and system endpoints",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        crate::api::routes::torrent_list,
        crate::api::routes::websocket,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::Status,
        crate::types::StateFilter,
        crate::types::PeerInfo,
        crate::types::Event,
        crate::session::TorrentView,
        crate::session::TorrentList,
        crate::config::Config,
        crate::config::DownloadConfig,
        crate::config::PersistenceConfig,
        crate::config::ServerIntegrationConfig,
        crate::config::ApiConfig,
        crate::config::ClientConnectConfig,
        crate::config::LoggingConfig,
        crate::config::LogOutput,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "torrents", description = "Torrent list snapshot"),
        (name = "websocket", description = "Authenticated command channel"),
        (name = "system", description = "Health checks and the OpenAPI spec"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();
        for path in ["/api", "/websocket", "/health", "/openapi.json"] {
            assert!(spec.paths.paths.contains_key(path), "missing path {}", path);
        }
    }

    #[test]
    fn spec_has_view_schemas() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components");
        assert!(components.schemas.contains_key("TorrentView"));
        assert!(components.schemas.contains_key("ApiError"));
    }
}
