use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::principal::{Principal, Role};

/// The session layer in front of this service authenticates callers and
/// forwards the resulting identity as headers; the core trusts them and
/// only enforces authorization.
#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = required_header(parts, "x-actor-id")?;
        let role = required_header(parts, "x-actor-role")?;

        let id = Uuid::parse_str(&id)
            .map_err(|err| AppError::Validation(format!("invalid x-actor-id: {err}")))?;
        let role: Role = role.parse().map_err(AppError::Validation)?;

        Ok(Principal { id, role })
    }
}

fn required_header(parts: &Parts, name: &str) -> Result<String, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(format!("missing {name} header")))
}

pub fn require_role(principal: Principal, role: Role) -> Result<Principal, AppError> {
    if principal.role != role {
        return Err(AppError::Forbidden(format!(
            "this operation requires the {role} role"
        )));
    }
    Ok(principal)
}
