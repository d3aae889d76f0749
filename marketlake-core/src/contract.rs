//! Versioned data contracts — required fields, logical types, compatibility.
//!
//! Contracts are loaded once per run from a TOML document and never mutated
//! afterwards; a new version is a new immutable [`Contract`] value.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("contract version '{version}' not found")]
    NotFound { version: String },

    #[error("contract '{version}' is malformed: {reason}")]
    Malformed { version: String, reason: String },

    #[error("failed to read contracts file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse contracts file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How strictly the validator holds records to the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    /// Missing required fields drop the record; type mismatches are coerced
    /// where safely possible.
    Backward,
    /// Any violation drops the record; no coercion.
    Strict,
    /// Only required-field presence is checked.
    None,
}

/// Logical field types the validator can check and coerce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    Str,
    Float,
    Int,
    Timestamp,
}

/// One immutable schema contract for an event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub version: String,
    pub compatibility: Compatibility,
    pub required_fields: Vec<String>,
    pub field_types: BTreeMap<String, LogicalType>,
}

impl Contract {
    pub fn field_type(&self, field: &str) -> Option<LogicalType> {
        self.field_types.get(field).copied()
    }
}

#[derive(Debug, Deserialize)]
struct ContractsDoc {
    contracts: BTreeMap<String, ContractEntry>,
}

#[derive(Debug, Deserialize)]
struct ContractEntry {
    compatibility: Compatibility,
    required_fields: Vec<String>,
    field_types: BTreeMap<String, LogicalType>,
}

/// Read-only registry of contract versions, shared during a run.
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    contracts: BTreeMap<String, Contract>,
}

impl ContractRegistry {
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ContractError> {
        let doc: ContractsDoc = toml::from_str(text)?;
        let mut contracts = BTreeMap::new();
        for (version, entry) in doc.contracts {
            if entry.required_fields.is_empty() {
                return Err(ContractError::Malformed {
                    version,
                    reason: "required_fields must not be empty".into(),
                });
            }
            if let Some(missing) = entry
                .required_fields
                .iter()
                .find(|field| !entry.field_types.contains_key(*field))
            {
                return Err(ContractError::Malformed {
                    reason: format!("required field '{missing}' has no declared type"),
                    version,
                });
            }
            contracts.insert(
                version.clone(),
                Contract {
                    version,
                    compatibility: entry.compatibility,
                    required_fields: entry.required_fields,
                    field_types: entry.field_types,
                },
            );
        }
        Ok(Self { contracts })
    }

    /// Look up an immutable contract by version tag.
    pub fn load(&self, version: &str) -> Result<&Contract, ContractError> {
        self.contracts
            .get(version)
            .ok_or_else(|| ContractError::NotFound {
                version: version.to_string(),
            })
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.contracts.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [contracts.v1]
        compatibility = "backward"
        required_fields = ["event_id", "symbol", "price", "volume", "ts_event", "ts_ingest"]

        [contracts.v1.field_types]
        event_id = "str"
        symbol = "str"
        price = "float"
        volume = "int"
        ts_event = "timestamp"
        ts_ingest = "timestamp"
        source = "str"
    "#;

    #[test]
    fn loads_known_version() {
        let registry = ContractRegistry::from_toml(SAMPLE).unwrap();
        let contract = registry.load("v1").unwrap();
        assert_eq!(contract.version, "v1");
        assert_eq!(contract.compatibility, Compatibility::Backward);
        assert_eq!(contract.required_fields.len(), 6);
        assert_eq!(contract.field_type("price"), Some(LogicalType::Float));
        assert_eq!(contract.field_type("unknown"), None);
    }

    #[test]
    fn unknown_version_is_not_found() {
        let registry = ContractRegistry::from_toml(SAMPLE).unwrap();
        let err = registry.load("v2").unwrap_err();
        assert!(matches!(err, ContractError::NotFound { version } if version == "v2"));
    }

    #[test]
    fn empty_required_fields_is_malformed() {
        let text = r#"
            [contracts.v1]
            compatibility = "strict"
            required_fields = []

            [contracts.v1.field_types]
            event_id = "str"
        "#;
        let err = ContractRegistry::from_toml(text).unwrap_err();
        assert!(matches!(err, ContractError::Malformed { .. }));
    }

    #[test]
    fn required_field_without_type_is_malformed() {
        let text = r#"
            [contracts.v1]
            compatibility = "strict"
            required_fields = ["event_id", "price"]

            [contracts.v1.field_types]
            event_id = "str"
        "#;
        let err = ContractRegistry::from_toml(text).unwrap_err();
        match err {
            ContractError::Malformed { reason, .. } => assert!(reason.contains("price")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn missing_structural_keys_fail_to_parse() {
        let text = r#"
            [contracts.v1]
            compatibility = "strict"
        "#;
        assert!(matches!(
            ContractRegistry::from_toml(text).unwrap_err(),
            ContractError::Parse(_)
        ));
    }

    #[test]
    fn versions_are_listed_sorted() {
        let text = format!(
            "{SAMPLE}\n[contracts.v0]\ncompatibility = \"none\"\nrequired_fields = [\"event_id\"]\n[contracts.v0.field_types]\nevent_id = \"str\"\n"
        );
        let registry = ContractRegistry::from_toml(&text).unwrap();
        let versions: Vec<&str> = registry.versions().collect();
        assert_eq!(versions, vec!["v0", "v1"]);
    }
}
