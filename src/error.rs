use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::bson::de::Error as BsonDeError;
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for every operation the backend exposes.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    BsonDe(#[from] BsonDeError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    /// The caller's role/ownership does not satisfy the operation's predicate.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// The target record never existed, or vanished between read and write.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Caller-supplied data failed a shape check.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    /// A transaction exhausted its automatic retries under contention.
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),
    /// Missing or bad credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn permission_denied(what: impl Into<String>) -> Self {
        Self::PermissionDenied(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::ValidationFailed(what.into())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = match &self {
            Self::Db(_) | Self::BsonDe(_) => Status::InternalServerError,
            Self::PermissionDenied(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::ValidationFailed(_) => Status::UnprocessableEntity,
            Self::TransactionConflict(_) => Status::Conflict,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
        };
        if status.class() == StatusClass::ServerError {
            error!("{self:?}");
        } else {
            debug!("{self:?}");
        }
        Err(status)
    }
}
