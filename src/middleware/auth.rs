use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{HeaderValue, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError, models::Role, state::AppState};

/// The calling principal. Identity comes from the bearer token; the role comes
/// from the account store when the user is known there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn decode_bearer(value: &HeaderValue, secret: &str) -> Result<AuthUser, AppError> {
    let auth_str = value.to_str().map_err(|_| AppError::Unauthenticated)?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AppError::Unauthenticated)?;

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|err| {
        tracing::debug!(error = %err, "rejected bearer token");
        AppError::Unauthenticated
    })?;

    let user_id =
        Uuid::parse_str(&decoded.claims.sub).map_err(|_| AppError::Unauthenticated)?;
    let role = decoded
        .claims
        .role
        .parse::<Role>()
        .map_err(|_| AppError::Unauthenticated)?;

    Ok(AuthUser { user_id, role })
}

/// The stored account's role wins over the token's claim, so a promotion
/// takes effect without a new token. Identities unknown to the store keep
/// the claimed role.
async fn resolve(state: &AppState, claimed: AuthUser) -> Result<AuthUser, AppError> {
    match state.accounts.find_user(claimed.user_id).await? {
        Some(user) => {
            if user.role != claimed.role {
                tracing::debug!(
                    user_id = %user.id,
                    claimed = claimed.role.as_str(),
                    stored = user.role.as_str(),
                    "token role is stale, using stored role"
                );
            }
            Ok(AuthUser::new(user.id, user.role))
        }
        None => Ok(claimed),
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthenticated)?;
        let state = AppState::from_ref(state);
        let claimed = decode_bearer(auth_header, &state.jwt_secret)?;
        resolve(&state, claimed).await
    }
}

/// Anonymous callers pass through as `None`; a token that is present must still be valid.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match parts.headers.get(header::AUTHORIZATION) {
            None => Ok(None),
            Some(value) => {
                let state = AppState::from_ref(state);
                let claimed = decode_bearer(value, &state.jwt_secret)?;
                resolve(&state, claimed).await.map(Some)
            }
        }
    }
}
