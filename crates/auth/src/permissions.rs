use std::borrow::Cow;

use serde::{Deserialize, Serialize};

pub const COMPONENTS_READ: &str = "components.read";
pub const COMPONENTS_WRITE: &str = "components.write";
pub const COMPONENTS_DECOMMISSION: &str = "components.decommission";
pub const MAINTENANCE_READ: &str = "maintenance.read";
pub const MAINTENANCE_WRITE: &str = "maintenance.write";
pub const INVENTORY_READ: &str = "inventory.read";
pub const INVENTORY_WRITE: &str = "inventory.write";

/// Permission identifier (e.g. "components.read").
///
/// The wildcard `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
