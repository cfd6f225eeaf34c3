//! Request extractors for the logged-in user

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::session;
use crate::models::user::User;
use crate::{AppError, SharedState};

/// Session token from the request cookie, if any
#[derive(Debug, Clone)]
pub struct SessionToken(pub Option<String>);

impl FromRequestParts<SharedState> for SessionToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &SharedState) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(session::token_from_headers(&parts.headers)))
    }
}

/// Any logged-in user
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let unauthorized = || AppError::Unauthorized("Please login to access this page.".into());

        let token = session::token_from_headers(&parts.headers).ok_or_else(unauthorized)?;
        let user = state
            .db
            .with_connection(|conn| Ok(session::session_user(conn, &token)))??;

        user.map(CurrentUser).ok_or_else(unauthorized)
    }
}

/// A logged-in Developer
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!("User {} denied admin access", user.id);
            return Err(AppError::Forbidden("Access denied. Admin privileges required.".into()));
        }
        Ok(AdminUser(user))
    }
}
