//! Error taxonomy for shopping list operations.
//!
//! Validation and not-found errors are reported immediately and never
//! retried. Store errors fail the operation that hit them. Remote errors are
//! absorbed into retry scheduling for mutations and only surface from an
//! explicit sync.

use thiserror::Error;

use crate::models::ItemId;

/// Input rejected before any I/O happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Quantity must be greater than 0 (got {0})")]
    NonPositiveQuantity(i32),
}

/// Local durable storage failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt stored item: {0}")]
    Corrupt(String),
}

/// Failure talking to the remote service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Item not found on remote: {0}")]
    NotFound(ItemId),

    #[error("Remote request timed out")]
    Timeout,

    #[error("Remote unavailable: {0}")]
    Unavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Invalid remote response: {0}")]
    Decode(String),
}

/// Errors returned by the engine and the public facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShoppingListError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Item not found: {0}")]
    NotFound(ItemId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Not connected to the remote service")]
    NotConnected,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub type Result<T> = std::result::Result<T, ShoppingListError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ShoppingListError::from(ValidationError::EmptyName).to_string(),
            "Name cannot be empty"
        );
        assert_eq!(
            ShoppingListError::from(ValidationError::NonPositiveQuantity(0)).to_string(),
            "Quantity must be greater than 0 (got 0)"
        );
        assert_eq!(
            ShoppingListError::NotFound(ItemId::from("abc")).to_string(),
            "Item not found: abc"
        );
        assert_eq!(
            ShoppingListError::from(RemoteError::Server {
                status: 503,
                message: "down".into()
            })
            .to_string(),
            "Remote returned 503: down"
        );
    }
}
