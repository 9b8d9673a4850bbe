use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("User not found")]
    UserNotFound,

    #[error("Post not found")]
    PostNotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl DomainError {
    pub fn to_status_code(&self) -> u16 {
        match self {
            Self::UserNotFound | Self::PostNotFound => 404,
            Self::Conflict(_) => 409,
            Self::ValidationError(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::UpstreamUnavailable(_) => 502,
            Self::DatabaseError(_) | Self::InternalError(_) => 500,
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(DomainError::UserNotFound.to_status_code(), 404);
        assert_eq!(DomainError::PostNotFound.to_status_code(), 404);
        assert_eq!(DomainError::Conflict("dup".into()).to_status_code(), 409);
        assert_eq!(
            DomainError::ValidationError("bad".into()).to_status_code(),
            400
        );
        assert_eq!(DomainError::Unauthorized("no".into()).to_status_code(), 401);
        assert_eq!(
            DomainError::DatabaseError("down".into()).to_status_code(),
            500
        );
    }

    #[test]
    fn driver_errors_become_database_errors() {
        let err = DomainError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DomainError::DatabaseError(_)));
    }
}
