//! Authenticated principal, established by an upstream layer.

use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Identity the request runs as. Upstream middleware may insert one into the
/// request extensions; otherwise a trusted proxy forwards it in the configured
/// header (`X-Authenticated-User` by default).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: Option<String>,
}

impl Principal {
    pub fn user(id: impl Into<String>) -> Self {
        Principal { id: Some(id.into()) }
    }

    pub fn anonymous() -> Self {
        Principal { id: None }
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(p) = parts.extensions.get::<Principal>().filter(|p| p.is_authenticated()) {
            return Ok(p.clone());
        }
        let forwarded = parts
            .headers
            .get(state.auth.principal_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty());
        match forwarded {
            Some(id) => Ok(Principal::user(id)),
            None if state.auth.required => Err(AppError::Unauthenticated),
            None => Ok(Principal::anonymous()),
        }
    }
}
