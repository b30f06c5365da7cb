use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
};
use tracing::warn;

use super::assertion::{IdentityAssertion, IDENTITY_HEADER};
use super::claims::IdentityKeys;
use crate::acl::repo_types::normalize_id;
use crate::state::AppState;

/// Keys the [`Caller`] extractor checks bearer tokens against. `None` means
/// the identity header is trusted as sent.
#[derive(Clone, Default)]
pub struct IdentityGate(pub Option<Arc<IdentityKeys>>);

impl FromRef<AppState> for IdentityGate {
    fn from_ref(state: &AppState) -> Self {
        IdentityGate(state.identity_keys.clone())
    }
}

/// Caller of the gateway. When an identity secret is configured the asserted
/// email must be backed by a valid bearer token for the same principal.
pub struct Caller {
    pub identity: IdentityAssertion,
}

impl Caller {
    pub fn email(&self) -> &str {
        &self.identity.email
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    IdentityGate: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity_from_headers(&parts.headers)?;

        let IdentityGate(keys) = IdentityGate::from_ref(state);
        let Some(keys) = keys else {
            return Ok(Caller { identity });
        };

        // Expect "Bearer <token>"
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .ok_or((StatusCode::UNAUTHORIZED, "missing bearer token".to_string()))?;

        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "identity token rejected");
            (StatusCode::UNAUTHORIZED, "invalid or expired token".to_string())
        })?;

        if normalize_id(&claims.email) != normalize_id(&identity.email) {
            warn!(
                asserted = %identity.email,
                token = %claims.email,
                "identity header does not match token"
            );
            return Err((
                StatusCode::UNAUTHORIZED,
                "identity does not match token".into(),
            ));
        }

        Ok(Caller { identity })
    }
}

pub(crate) fn identity_from_headers(
    headers: &HeaderMap,
) -> Result<IdentityAssertion, (StatusCode, String)> {
    let raw = headers
        .get(IDENTITY_HEADER)
        .ok_or((StatusCode::UNAUTHORIZED, "missing identity header".to_string()))?;
    IdentityAssertion::from_header(raw).map_err(|e| {
        warn!(error = %e, "bad identity header");
        (StatusCode::UNAUTHORIZED, "invalid identity header".to_string())
    })
}
