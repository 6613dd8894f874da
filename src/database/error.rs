use std::fmt::{self, Display};

use serde::Serialize;
use thiserror::Error;
use warp::http::StatusCode;

/// Postgres SQLSTATE codes the relation tables rely on.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    Validation,
    Unauthorized,
    Forbidden,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Conflicts keep the 400 the public API has always answered with.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict | ErrorKind::BadRequest | ErrorKind::Validation => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(info: &str) -> Self {
        Error::NotFound(info.to_string())
    }

    pub fn forbidden() -> Self {
        Error::Forbidden(String::from(
            "You don't have permission to perform this action",
        ))
    }
}

impl warp::reject::Reject for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    RowNotFound,
    Other,
}

#[derive(Debug)]
pub struct QueryError {
    kind: QueryErrorKind,
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            kind: QueryErrorKind::Other,
            info,
        }
    }

    pub fn kind(&self) -> QueryErrorKind {
        self.kind
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => {
                let kind = match e.code().as_deref() {
                    Some(UNIQUE_VIOLATION) => QueryErrorKind::UniqueViolation,
                    Some(FOREIGN_KEY_VIOLATION) => QueryErrorKind::ForeignKeyViolation,
                    _ => QueryErrorKind::Other,
                };
                Self {
                    kind,
                    info: format!("{e}"),
                }
            }
            sqlx::Error::RowNotFound => Self {
                kind: QueryErrorKind::RowNotFound,
                info: String::from("RowNotFound"),
            },
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(e),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(String::from("Unknown error")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        match value.kind {
            QueryErrorKind::UniqueViolation => Error::Conflict(value.info),
            QueryErrorKind::ForeignKeyViolation | QueryErrorKind::RowNotFound => {
                Error::NotFound(value.info)
            }
            QueryErrorKind::Other => {
                log::error!("Query failed: {}", value.info);
                Error::Internal(String::from("Internal server error"))
            }
        }
    }
}

/// Malformed input, rejected before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    field: String,
    info: String,
}

impl ValidationError {
    pub fn new(field: &str, info: &str) -> Self {
        Self {
            field: field.to_string(),
            info: info.to_string(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.info)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for Error {
    fn from(value: ValidationError) -> Self {
        Error::Validation(value.to_string())
    }
}
