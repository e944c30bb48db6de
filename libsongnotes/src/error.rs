//! Objects related to reporting errors from this library

use crate::access::ResourceKind;

/// A list of error types that can occur within this library
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // authentication-related errors
    #[error("authentication error: couldn't hash password")]
    AuthHashFailure(#[from] password_hash::Error),

    #[error("authentication error: password mismatch")]
    AuthPasswordMismatch,

    #[error("invalid username: too short")]
    AuthInvalidUsernameTooShort,

    #[error("invalid username: first character is invalid")]
    AuthInvalidUsernameFirstCharacter,

    #[error("invalid username: contains invalid characters")]
    AuthInvalidUsernameInvalidCharacters(String),

    #[error("{0} {1} does not exist")]
    NotFound(ResourceKind, i64),

    #[error("cannot update the '{0}' field")]
    UpdateFieldNotAllowed(String),

    #[error("user {user} is not the owner of {kind} {id}")]
    NotOwner {
        kind: ResourceKind,
        id: i64,
        user: i64,
    },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("can't update the object, no id was specified")]
    InvalidUpdateObjectNotFound,

    #[error("Database error: unspecified")]
    DatabaseUnspecified(#[source] sqlx::Error),

    #[error("Database error: row not found")]
    DatabaseRowNotFound(#[source] sqlx::Error),

    #[error("Database error: migration failed")]
    DatabaseMigration(#[from] sqlx::migrate::MigrateError),
}

impl std::convert::From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::DatabaseRowNotFound(value),
            _ => Self::DatabaseUnspecified(value),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
