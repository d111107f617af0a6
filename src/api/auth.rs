use crate::entities::user;
use crate::error::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use serde_json::json;

pub const SESSION_COOKIE: &str = "gar_user";

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    name: String,
    phone: Option<String>,
}

pub async fn register(
    Extension(db): Extension<DatabaseConnection>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response> {
    if payload.email.is_empty() || payload.password.len() < 8 {
        return Err(AppError::Validation(
            "email required and password must be at least 8 characters".to_string(),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))?
        .to_string();

    let now = chrono::Utc::now().naive_utc();
    let new_user = user::ActiveModel {
        email: Set(payload.email),
        password_hash: Set(password_hash),
        name: Set(payload.name),
        phone: Set(payload.phone),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let saved = match new_user.insert(&db).await {
        Ok(u) => u,
        Err(e) if e.to_string().contains("duplicate key value") => {
            return Err(AppError::Conflict("email already exists".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::Span::current()
        .record("user_id", saved.id)
        .record("business_event", "user registered");
    metrics::counter!("gar_users_registered_total").increment(1);

    Ok((
        StatusCode::CREATED,
        Json(json!({"id": saved.id, "email": saved.email, "name": saved.name})),
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

pub async fn login(
    Extension(db): Extension<DatabaseConnection>,
    cookies: tower_cookies::Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    let user = user::Entity::find()
        .filter(user::Column::Email.eq(payload.email.clone()))
        .one(&db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal("invalid password hash in db".to_string()))?;

    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Unauthorized);
    }

    let mut cookie = tower_cookies::Cookie::new(SESSION_COOKIE, user.id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.add(cookie);

    tracing::Span::current()
        .record("user_id", user.id)
        .record("business_event", "user logged in");

    Ok((StatusCode::OK, Json(json!({"message": "Login successful"}))).into_response())
}
