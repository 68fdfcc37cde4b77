//! Message value types.
//!
//! The service carries the message value as an arbitrary JSON value. A
//! deployment picks how handlers see it by choosing the connector's payload
//! type: structured [`serde_json::Value`], plain [`String`], or raw JSON text
//! as [`Bytes`].

use bytes::Bytes;
use serde_json::Value;

use crate::error::ConnectorError;

/// A value that can travel as the `value` field of a topic message.
pub trait Payload: Send + 'static {
    /// Convert into the JSON value placed in a publish body.
    fn into_wire(self) -> Result<Value, ConnectorError>;

    /// Build from the JSON value found in a pulled message.
    fn from_wire(value: Value) -> Result<Self, ConnectorError>
    where
        Self: Sized;
}

impl Payload for Value {
    fn into_wire(self) -> Result<Value, ConnectorError> {
        Ok(self)
    }

    fn from_wire(value: Value) -> Result<Self, ConnectorError> {
        Ok(value)
    }
}

/// Plain string values. Non-string JSON arrives as its compact JSON text.
impl Payload for String {
    fn into_wire(self) -> Result<Value, ConnectorError> {
        Ok(Value::String(self))
    }

    fn from_wire(value: Value) -> Result<Self, ConnectorError> {
        match value {
            Value::String(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }
}

/// Raw JSON text, embedded verbatim on publish.
impl Payload for Bytes {
    fn into_wire(self) -> Result<Value, ConnectorError> {
        serde_json::from_slice(&self)
            .map_err(|e| ConnectorError::Transport(format!("Malformed JSON value: {}", e)))
    }

    fn from_wire(value: Value) -> Result<Self, ConnectorError> {
        serde_json::to_vec(&value)
            .map(Bytes::from)
            .map_err(|e| ConnectorError::Transport(format!("Failed to encode value: {}", e)))
    }
}
