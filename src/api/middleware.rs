use crate::error::AppError;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;

pub async fn auth_middleware(cookies: Cookies, mut request: Request, next: Next) -> Response {
    if let Some(cookie) = cookies.get(super::auth::SESSION_COOKIE) {
        if let Ok(owner_id) = cookie.value().parse::<i32>() {
            request.extensions_mut().insert(owner_id);
            return next.run(request).await;
        }
    }
    AppError::Unauthorized.into_response()
}
