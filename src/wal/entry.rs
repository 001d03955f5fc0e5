//! WAL Entry definitions
//!
//! Defines the operations recorded in the log.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WalOperation {
    /// Set a logical key to a value
    Set { key: String, value: Value },
}

impl WalOperation {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        WalOperation::Set {
            key: key.into(),
            value,
        }
    }

    /// Logical key the operation touches
    pub fn key(&self) -> &str {
        match self {
            WalOperation::Set { key, .. } => key,
        }
    }
}
