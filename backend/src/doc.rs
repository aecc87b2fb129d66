//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every feedback endpoint, the health probes and the
//! shared error payload. Callers are identified by the gateway headers, which
//! are documented as API key schemes.
//!
//! The generated specification is used by Swagger UI (debug builds) and
//! exported via `cargo run --bin openapi-dump` for external tooling.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::{Error, ErrorCode};
use crate::inbound::http::feedback::{
    EventAcceptedResponse, FeedbackListItem, FeedbackRequest, FeedbackResponse,
    UserDeletedEventBody,
};
use crate::inbound::http::health::ReadinessReport;
use crate::inbound::http::principal::{USER_NAME_HEADER, USER_ROLES_HEADER};

/// Enrich the generated document with the gateway identity headers.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "GatewayUser",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                USER_NAME_HEADER,
                "Authenticated login name forwarded by the gateway.",
            ))),
        );
        components.add_security_scheme(
            "GatewayRoles",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                USER_ROLES_HEADER,
                "Comma-separated roles, e.g. ROLE_USER,ROLE_ADMIN.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only and used by tooling.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Feedback service API",
        description = "Training session feedback with remote consistency checks."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("GatewayUser" = [], "GatewayRoles" = [])),
    paths(
        crate::inbound::http::feedback::submit_feedback,
        crate::inbound::http::feedback::own_feedbacks,
        crate::inbound::http::feedback::own_feedback,
        crate::inbound::http::feedback::admin_by_user,
        crate::inbound::http::feedback::admin_by_training,
        crate::inbound::http::feedback::admin_by_natural_key,
        crate::inbound::http::feedback::publish_user_deleted,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        FeedbackRequest,
        FeedbackResponse,
        FeedbackListItem,
        UserDeletedEventBody,
        EventAcceptedResponse,
        ReadinessReport,
    )),
    tags(
        (name = "feedback", description = "Feedback written and read by trainees"),
        (name = "feedback-admin", description = "Administrative feedback reads and events"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    //! Tests verifying OpenAPI document structure.

    use super::*;
    use rstest::rstest;
    use utoipa::OpenApi;
    use utoipa::openapi::RefOr;
    use utoipa::openapi::schema::Schema;

    /// Assert that an Object schema contains a field with the given name.
    fn assert_object_schema_has_field(schema: &RefOr<Schema>, field: &str) {
        match schema {
            RefOr::T(Schema::Object(obj)) => {
                assert!(
                    obj.properties.contains_key(field),
                    "schema should have field '{field}'"
                );
            }
            _ => panic!("expected Object schema"),
        }
    }

    #[rstest]
    #[case::error("Error", &["code", "message", "traceId", "details"])]
    #[case::request("FeedbackRequest", &["comment", "starRating"])]
    #[case::list_item(
        "FeedbackListItem",
        &["feedbackId", "userId", "trainingSessionId", "comment", "starRating"]
    )]
    fn schemas_expose_camel_case_fields(#[case] name: &str, #[case] fields: &[&str]) {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        let schema = schemas.get(name).expect("schema registered");
        for field in fields {
            assert_object_schema_has_field(schema, field);
        }
    }

    #[rstest]
    #[case("/feedbacks/{user_id}/{training_session_id}")]
    #[case("/feedbacks/me")]
    #[case("/feedbacks/{training_session_id}")]
    #[case("/feedbacks/admin/by-user/{user_id}")]
    #[case("/feedbacks/admin/by-training/{training_session_id}")]
    #[case("/feedbacks/admin/{user_id}/{training_session_id}")]
    #[case("/feedbacks/admin/events/user-deleted")]
    #[case("/health/ready")]
    fn paths_are_documented(#[case] path: &str) {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key(path), "missing {path}");
    }

    #[rstest]
    fn gateway_headers_are_security_schemes() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("GatewayUser"));
        assert!(components.security_schemes.contains_key("GatewayRoles"));
    }
}
