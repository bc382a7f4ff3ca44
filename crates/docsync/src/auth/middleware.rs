use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::LockError;
use crate::services::ProjectService;
use crate::AuthenticatedProject;

pub const HEADER_API_KEY: &str = "X-API-Key";

/// Extract API key from request headers
pub fn extract_api_key(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(HEADER_API_KEY)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the API key to its project and attach it as `AuthenticatedProject`.
///
/// Handlers compare that project against the one in their path.
pub async fn require_api_key(
    State(projects): State<ProjectService>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(api_key) = extract_api_key(&request) else {
        return LockError::Unauthorized("Missing API key".to_string()).into_response();
    };

    match projects.verify_api_key(&api_key).await {
        Ok(Some(info)) => {
            tracing::debug!(project_id = %info.project_id, key_prefix = %info.key_prefix, "Hook request authenticated");
            request
                .extensions_mut()
                .insert(AuthenticatedProject(info.project_id));
            next.run(request).await
        }
        Ok(None) => LockError::Unauthorized("Invalid API key".to_string()).into_response(),
        Err(e) => e.into_response(),
    }
}
