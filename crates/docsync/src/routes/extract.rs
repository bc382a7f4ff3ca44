//! JSON body extractor that rejects with `LockError`

use axum::extract::FromRequest;

use crate::error::LockError;

/// Like `axum::Json`, but a body that does not parse answers with the
/// usual `VALIDATION_ERROR` payload instead of a plain-text 422
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(LockError))]
pub struct ApiJson<T>(pub T);
