//! OpenAPI specification for the agent

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use crate::handlers::{ErrorResponse, HealthData, HealthResponse, StatusData, StatusResponse};

/// OpenAPI document for the agent's endpoints
#[derive(OpenApi)]
#[openapi(
    info(
        title = "KotH Agent API",
        description = "Small HTTP interface for scoring servers to poll during a King of the Hill CTF",
        license(name = "Apache-2.0")
    ),
    paths(crate::handlers::status, crate::handlers::healthcheck),
    components(schemas(
        StatusResponse,
        StatusData,
        HealthResponse,
        HealthData,
        ErrorResponse
    )),
    tags((name = "Agent", description = "Ownership and health polling")),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the `Authorization` header scheme
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "AuthenticationToken",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "`Token <secret>` or the bare secret",
                ))),
            );
        }
    }
}

/// Get the OpenAPI specification as JSON
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Get the OpenAPI specification as YAML
pub fn get_openapi_yaml() -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&ApiDoc::openapi())
}
