use axum::http::{header::AUTHORIZATION, HeaderMap};
use subtle::ConstantTimeEq;

use crate::error::{Result, VerifyError};

/// Check the `Authorization: Bearer <secret>` header against the configured
/// cron secret. With no secret configured every request is accepted.
pub fn authorize(headers: &HeaderMap, secret: Option<&str>) -> Result<()> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(VerifyError::Unauthorized)?;

    if bool::from(provided.trim().as_bytes().ct_eq(secret.as_bytes())) {
        Ok(())
    } else {
        Err(VerifyError::Unauthorized)
    }
}
