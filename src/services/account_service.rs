use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::RegisterRequest,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Role, User},
    response::{ApiResponse, Meta},
    state::AppState,
    store::NewUser,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

/// New accounts always start as customers.
pub async fn register(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("a valid email is required".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::BadRequest("password is required".into()));
    }
    let phone_number = payload
        .phone_number
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    if state.accounts.email_registered(&email).await? {
        return Err(AppError::Conflict("email already registered".into()));
    }
    if let Some(phone) = phone_number.as_deref() {
        if state.accounts.phone_registered(phone).await? {
            return Err(AppError::Conflict("phone number already registered".into()));
        }
    }

    let user = NewUser {
        id: Uuid::new_v4(),
        email,
        password_hash: hash_password(&payload.password)?,
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone_number,
        role: Role::Customer,
        created_at: Utc::now(),
    };
    let user = state.accounts.insert_user(user).await?;

    tracing::info!(user_id = %user.id, "user registered");
    audit::record(
        state.audit.as_ref(),
        Some(user.id),
        "user_register",
        "users",
        json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success("User created", user, Some(Meta::empty())))
}

/// The stored account behind the caller's token, with its current role.
pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let stored = state
        .accounts
        .find_user(user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Current user", stored, None))
}
