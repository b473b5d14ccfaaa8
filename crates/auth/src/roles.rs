use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;
use crate::permissions::{
    COMPONENTS_DECOMMISSION, COMPONENTS_READ, COMPONENTS_WRITE, INVENTORY_READ, INVENTORY_WRITE,
    MAINTENANCE_READ, MAINTENANCE_WRITE,
};

/// Role identifier used for RBAC.
///
/// Roles are opaque strings in tokens; [`permissions_for_roles`] is the
/// policy that turns them into permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const SUPERVISOR: &'static str = "supervisor";
    pub const TECHNICIAN: &'static str = "tecnico";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role → permission policy.
///
/// `admin` grants the wildcard; unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut granted: Vec<Permission> = Vec::new();
    for role in roles {
        let perms: &[&'static str] = match role.as_str() {
            Role::ADMIN => &["*"],
            Role::SUPERVISOR => &[
                COMPONENTS_READ,
                COMPONENTS_WRITE,
                COMPONENTS_DECOMMISSION,
                MAINTENANCE_READ,
                MAINTENANCE_WRITE,
                INVENTORY_READ,
                INVENTORY_WRITE,
            ],
            Role::TECHNICIAN => &[COMPONENTS_READ, MAINTENANCE_READ, MAINTENANCE_WRITE, INVENTORY_READ],
            _ => &[],
        };
        for p in perms {
            let p = Permission::new(*p);
            if !granted.contains(&p) {
                granted.push(p);
            }
        }
    }
    granted
}
