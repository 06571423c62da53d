use crate::error::AppError;

/// Hashes a password with bcrypt off the async runtime.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
        .map_err(AppError::from)
}

/// Checks a password against a stored bcrypt hash off the async runtime.
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))?;

    match verified {
        Ok(valid) => Ok(valid),
        Err(bcrypt::BcryptError::InvalidHash(_)) => {
            tracing::warn!("stored password hash is malformed");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
