/// Resource identifiers
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of an API object
///
/// Most Linode objects are keyed by integers; regions, types, Kubernetes
/// versions and the profile (username) are keyed by strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Int(u64),
    Str(String),
}

impl ResourceId {
    /// Read an identifier out of a JSON value; `None` for anything but a
    /// non-negative integer or a string
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(ResourceId::Int),
            Value::String(s) => Some(ResourceId::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ResourceId::Int(n) => Value::from(*n),
            ResourceId::Str(s) => Value::from(s.as_str()),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ResourceId::Int(n) => Some(*n),
            ResourceId::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResourceId::Str(s) => Some(s),
            ResourceId::Int(_) => None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Int(n) => write!(f, "{}", n),
            ResourceId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        ResourceId::Int(id)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        ResourceId::Str(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        ResourceId::Str(id)
    }
}

impl PartialEq<u64> for ResourceId {
    fn eq(&self, other: &u64) -> bool {
        self.as_u64() == Some(*other)
    }
}

impl PartialEq<&str> for ResourceId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}
