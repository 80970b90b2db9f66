//! The module contains the errors the engine can throw.
//!
//! The first six variants are domain validation failures: they are raised
//! before any write happens and can be shown to the user verbatim.
//! [`Database`] wraps storage failures and always aborts the enclosing
//! transaction.
//!
//! [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Amount exceeds outstanding principal: {0}")]
    ExceedsPrincipal(String),
    #[error("Nothing to undo in chat {0}")]
    NothingToUndo(i64),
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::InvalidTransition(a), Self::InvalidTransition(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::ExceedsPrincipal(a), Self::ExceedsPrincipal(b)) => a == b,
            (Self::NothingToUndo(a), Self::NothingToUndo(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
