use std::fmt::{self, Display};

use potion::HtmlError;
use warp::reject::Rejection;

/// Every failure the SDK reports. Variants carry the caller-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Duplicate relation, self-follow or other uniqueness clash.
    Conflict(String),
    /// Missing target entity or missing relation.
    NotFound(String),
    /// Malformed or missing input.
    Validation(String),
    Unauthorized(String),
    InvalidSession(String),
    Query(String),
    Internal(String),
}

impl DomainError {
    pub fn conflict(info: &str) -> Self {
        Self::Conflict(info.to_owned())
    }

    pub fn not_found(info: &str) -> Self {
        Self::NotFound(info.to_owned())
    }

    pub fn validation(info: &str) -> Self {
        Self::Validation(info.to_owned())
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized(String::from(
            "You don't have permission to perform this action",
        ))
    }

    pub fn info(&self) -> &str {
        match self {
            Self::Conflict(info)
            | Self::NotFound(info)
            | Self::Validation(info)
            | Self::Unauthorized(info)
            | Self::InvalidSession(info)
            | Self::Query(info)
            | Self::Internal(info) => info,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Conflict(_) | Self::Validation(_) => 400,
            Self::InvalidSession(_) => 401,
            Self::Unauthorized(_) => 403,
            Self::NotFound(_) => 404,
            Self::Query(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                Self::Conflict(format!("Already exists ({e})"))
            }
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => {
                Self::NotFound(format!("Referenced row doesn't exist ({e})"))
            }
            sqlx::Error::Database(e) if e.is_check_violation() => {
                Self::Validation(format!("{e}"))
            }
            sqlx::Error::Configuration(e) => Self::Query(format!("{e}")),
            sqlx::Error::Database(e) => Self::Query(format!("{e}")),
            sqlx::Error::Io(e) => Self::Query(format!("{e}")),
            sqlx::Error::Tls(e) => Self::Query(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::Query(format!("{e}")),
            sqlx::Error::RowNotFound => Self::NotFound(String::from("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::Query(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::Query(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::Query(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Query(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::Query(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::Query(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::Query(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::Query(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::Query(format!("{e}")),
            _ => Self::Query(String::from("Unknown error")),
        }
    }
}

impl From<DomainError> for potion::Error {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(info) | DomainError::Validation(info) => {
                HtmlError::InvalidRequest.new(&info)
            }
            DomainError::Unauthorized(info) => HtmlError::Unauthorized.new(&info),
            DomainError::InvalidSession(info) => HtmlError::InvalidSession.new(&info),
            DomainError::NotFound(info) => potion::Error {
                code: 404,
                info: Some(info),
                redirect: None,
            },
            DomainError::Query(info) | DomainError::Internal(info) => potion::Error {
                code: 500,
                info: Some(info),
                redirect: None,
            },
        }
    }
}

impl From<DomainError> for Rejection {
    fn from(value: DomainError) -> Self {
        let error: potion::Error = value.into();
        error.into()
    }
}

impl Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.code(), self.info())
    }
}

impl std::error::Error for DomainError {}
