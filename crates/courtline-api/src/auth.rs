//! Admin authorization.
//!
//! Admin routes sit behind an [`AdminGate`]: it only answers whether a
//! request may act as an administrator. The bundled gate compares a static
//! bearer token.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Decides whether a request is allowed to use admin operations.
pub trait AdminGate: Send + Sync {
    fn authorize(&self, headers: &HeaderMap) -> bool;
}

/// Accepts `Authorization: Bearer <token>` for one configured token.
/// With no token configured every request is denied.
pub struct StaticTokenGate {
    token: Option<String>,
}

impl StaticTokenGate {
    pub fn new(token: Option<String>) -> Self {
        if token.is_none() {
            warn!("ADMIN_TOKEN not set, admin endpoints are disabled");
        }
        Self { token }
    }
}

impl AdminGate for StaticTokenGate {
    fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = self.token.as_deref() else {
            return false;
        };

        headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extractor proving the request passed the admin gate.
pub struct AdminUser;

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if state.admin_gate.authorize(&parts.headers) {
            Ok(AdminUser)
        } else {
            Err(ApiError::unauthorized("Admin access required"))
        }
    }
}
