//! Request extractors.

use axum::extract::FromRequest;

use crate::error::AppError;

/// `Json` whose rejections become 400 validation errors in our error format.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
