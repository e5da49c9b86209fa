mod config_cmd;
mod daemon;
mod item;
mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use daemon::DaemonCommand;
pub use item::{AddCommand, EditCommand, ItemRef, ListCommand, ShowCommand};
pub use sync_cmd::SyncCommand;

use clap::ValueEnum;
use shoplist_core::{ShoppingListError, StoreError};

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Errors from item and sync commands
#[derive(Debug)]
pub enum CommandError {
    /// No item id starts with the given text
    UnknownItem(String),
    /// More than one item id starts with the given text
    AmbiguousItem(String, usize),
    List(ShoppingListError),
    Output(serde_json::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::UnknownItem(id) => write!(f, "Item not found: {}", id),
            CommandError::AmbiguousItem(id, count) => write!(
                f,
                "'{}' matches {} items, use more characters of the id",
                id, count
            ),
            CommandError::List(e) => write!(f, "{}", e),
            CommandError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::List(e) => Some(e),
            CommandError::Output(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShoppingListError> for CommandError {
    fn from(e: ShoppingListError) -> Self {
        CommandError::List(e)
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        CommandError::List(e.into())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        CommandError::Output(e)
    }
}
