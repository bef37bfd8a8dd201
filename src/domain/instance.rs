//! Origin Instance Identifier

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Random token naming the current server process.
///
/// Generated once at startup and read-only afterwards; cloning shares the
/// same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(Arc<str>);

impl InstanceId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string().into())
    }

    /// Use a pinned identifier, falling back to a generated one when blank.
    pub fn from_config(pinned: Option<&str>) -> Self {
        match pinned.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self(id.into()),
            None => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
