//! Engine configuration
//!
//! An [`EngineConfig`] is the serializable form of the builder options, so an
//! engine can be described in a TOML or JSON file:
//!
//! ```toml
//! as_datetime_str = true
//!
//! [schema]
//! id = { type = "integer", unique = true }
//! name = "str"
//! email = { not_null = true }
//! ```

use serde::{Deserialize, Serialize};

use crate::constraint::SchemaDecl;
use crate::error::{SchemaError, SchemaResult};

/// Serializable engine options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Emit datetimes as ISO-8601 strings
    pub as_datetime_str: bool,
    /// Initial schema declaration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaDecl>,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> SchemaResult<Self> {
        toml::from_str(text)
            .map_err(|e| SchemaError::invalid_argument(format!("invalid TOML config: {}", e)))
    }

    pub fn from_json_str(text: &str) -> SchemaResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| SchemaError::invalid_argument(format!("invalid JSON config: {}", e)))
    }

    pub fn to_toml_string(&self) -> SchemaResult<String> {
        toml::to_string(self)
            .map_err(|e| SchemaError::invalid_argument(format!("config not representable: {}", e)))
    }
}
