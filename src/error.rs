//! Error types for the spatial mixer

use thiserror::Error;

use crate::registry::ObjectId;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by the graph collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Unknown port: {0}")]
    UnknownPort(ObjectId),

    #[error("Unknown link: {0}")]
    UnknownLink(ObjectId),

    #[error("Unknown node: {0}")]
    UnknownNode(ObjectId),

    #[error("Not connected to the graph server")]
    Disconnected,

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Errors raised while marshaling a command onto the event loop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Slot {slot} out of range (have {count})")]
    InvalidSlot { slot: usize, count: usize },

    #[error("Event loop is not running")]
    LoopClosed,

    #[error("Command invoked from the event loop thread")]
    Reentrant,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
