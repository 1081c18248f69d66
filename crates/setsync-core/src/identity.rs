//! # Identifier Newtypes
//!
//! Distinct types for field keys, flag ids and contract ids. You cannot pass
//! a [`FlagId`] where a [`FieldKey`] is expected, and none of them may be
//! empty. Deserialization runs the same validation as `new()`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::pillar::PillarKey;

/// Wrap a non-empty literal without validation. Only for compile-time constants.
macro_rules! literal_ctor {
    ($ty:ident) => {
        impl $ty {
            pub(crate) fn from_literal(value: &'static str) -> Self {
                debug_assert!(!value.trim().is_empty());
                Self(value.to_string())
            }
        }
    };
}

literal_ctor!(FieldKey);
literal_ctor!(FlagId);
literal_ctor!(ContractId);

fn non_empty(kind: &'static str, value: String) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyIdentifier { kind });
    }
    Ok(value)
}

/// Key of a campaign field. A pillar is a field whose key is a pillar name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldKey(String);

impl FieldKey {
    /// Create a field key, rejecting empty or whitespace-only input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty("FieldKey", value.into()).map(Self)
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The pillar this field represents, if its key names one.
    pub fn pillar(&self) -> Option<PillarKey> {
        self.0.parse().ok()
    }
}

impl From<PillarKey> for FieldKey {
    fn from(pillar: PillarKey) -> Self {
        Self(pillar.as_str().to_string())
    }
}

impl TryFrom<String> for FieldKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FieldKey> for String {
    fn from(key: FieldKey) -> Self {
        key.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a flag as issued by the audit backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FlagId(String);

impl FlagId {
    /// Create a flag id, rejecting empty input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty("FlagId", value.into()).map(Self)
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reports raise one flag per pillar, identified by the pillar's field key.
impl From<&FieldKey> for FlagId {
    fn from(key: &FieldKey) -> Self {
        Self(key.as_str().to_string())
    }
}

impl TryFrom<String> for FlagId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FlagId> for String {
    fn from(id: FlagId) -> Self {
        id.0
    }
}

impl fmt::Display for FlagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a sales contract, e.g. `CNT-NIKE-VALENTINE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractId(String);

impl ContractId {
    /// Create a contract id, rejecting empty input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty("ContractId", value.into()).map(Self)
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContractId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContractId> for String {
    fn from(id: ContractId) -> Self {
        id.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
