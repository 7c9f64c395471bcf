//! Caller identity, as asserted by the upstream auth layer.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use wick_commerce::cart::CartOwner;
use wick_commerce::ids::{GuestId, UserId};

use super::ApiError;
use crate::context::AppContext;

pub const USER_HEADER: &str = "x-user-id";
pub const GUEST_HEADER: &str = "x-guest-id";
pub const ADMIN_HEADER: &str = "x-admin-token";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The shopper: a signed-in user, or a guest when no user is present.
#[derive(Debug, Clone)]
pub struct Shopper(pub CartOwner);

impl<S: Send + Sync> FromRequestParts<S> for Shopper {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = header(&parts.headers, USER_HEADER) {
            return Ok(Shopper(CartOwner::User(UserId::new(user))));
        }
        if let Some(guest) = header(&parts.headers, GUEST_HEADER) {
            return Ok(Shopper(CartOwner::Guest(GuestId::new(guest))));
        }
        Err(ApiError::Unauthorized("X-User-Id or X-Guest-Id header is required"))
    }
}

/// A signed-in user. Guests are rejected.
#[derive(Debug, Clone)]
pub struct SignedIn(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for SignedIn {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header(&parts.headers, USER_HEADER)
            .map(|user| SignedIn(UserId::new(user)))
            .ok_or(ApiError::Unauthorized("X-User-Id header is required"))
    }
}

/// Proof that the caller holds the configured admin token.
#[derive(Debug, Clone, Copy)]
pub struct Admin;

impl FromRequestParts<AppContext> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppContext) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.server.admin_token.as_deref() else {
            return Err(ApiError::Unauthorized("admin routes are disabled"));
        };
        match header(&parts.headers, ADMIN_HEADER) {
            Some(token) if token == expected => Ok(Admin),
            Some(_) => {
                tracing::warn!("admin token rejected");
                Err(ApiError::Unauthorized("invalid admin token"))
            }
            None => Err(ApiError::Unauthorized("X-Admin-Token header is required")),
        }
    }
}
