//! Error types.

use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by store definition, resolution and the store handle.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A store accessor ran with no registry entered on this thread.
    #[error("no active registry; enter one with `Registry::enter` or pass it explicitly")]
    NoActiveRegistry,

    /// The setup procedure returned an error. Nothing was registered.
    #[error("setup of store `{id}` failed")]
    SetupFailure {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("store `{id}` has no action named `{name}`")]
    UnknownAction { id: String, name: String },

    #[error("store `{id}` is a setup store and has no initial state to reset to")]
    ResetUnsupported { id: String },

    #[error("scope of store `{id}` is already stopped")]
    ScopeStopped { id: String },

    #[error("store options carry no identifier")]
    MissingId,
}

/// The value an action failed with.
///
/// Carries a message and an arbitrary JSON payload, and is handed by
/// reference to every `on_error` hook of the failing invocation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ActionError {
    message: String,
    payload: Value,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

impl From<anyhow::Error> for ActionError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}
