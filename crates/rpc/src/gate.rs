//! Admin/Role gate and per-request caller context
//!
//! There is no ambient session: the identity layer resolves a [`Caller`]
//! once per request and every operation receives it explicitly.

use crate::members::normalize_phone;
use dashmap::DashMap;
use levelbank_core::{EngineError, EngineResult, Principal};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum_macros::{Display, EnumString};

/// Access role of a principal
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    User,
    Guest,
}

/// Identity provider seam (login, OTP and sessions live outside the engine)
pub trait IdentityResolver: Send + Sync {
    /// The authenticated principal behind the current request, if any
    fn current_caller(&self) -> Option<Principal>;
}

/// Fixed identity, for embedding callers and tests
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<Principal>);

impl StaticIdentity {
    pub fn new(principal: Principal) -> Self {
        Self(Some(principal))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityResolver for StaticIdentity {
    fn current_caller(&self) -> Option<Principal> {
        self.0.clone()
    }
}

/// Authorization context of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    principal: Option<Principal>,
    role: Role,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self {
            principal: None,
            role: Role::Guest,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The caller's principal, or `Unauthorized` for anonymous callers
    pub fn authenticated(&self) -> EngineResult<&Principal> {
        self.principal.as_ref().ok_or(EngineError::Unauthorized)
    }

    /// Gate for privileged operations
    pub fn require_admin(&self) -> EngineResult<&Principal> {
        match (&self.principal, self.role) {
            (Some(principal), Role::Admin) => Ok(principal),
            _ => {
                tracing::warn!(
                    caller = ?self.principal.as_ref().map(|p| p.as_str()),
                    role = %self.role,
                    "Admin operation denied"
                );
                Err(EngineError::Unauthorized)
            }
        }
    }

    /// Admins may act on anyone; members only on themselves
    pub fn require_self_or_admin(&self, target: &Principal) -> EngineResult<()> {
        if self.is_admin() || self.principal.as_ref() == Some(target) {
            Ok(())
        } else {
            Err(EngineError::Unauthorized)
        }
    }
}

/// Role assignments plus the admin phone allow-list
#[derive(Debug, Default)]
pub struct RoleGate {
    roles: DashMap<Principal, Role>,
    admin_phones: HashSet<String>,
}

impl RoleGate {
    pub fn new<I, S>(admin_phones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            roles: DashMap::new(),
            admin_phones: admin_phones
                .into_iter()
                .map(|p| normalize_phone(p.as_ref()))
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Role of an authenticated principal (`User` unless assigned)
    pub fn role_of(&self, principal: &Principal) -> Role {
        self.roles.get(principal).map(|r| *r).unwrap_or_default()
    }

    /// Build the caller context for one request.
    pub fn resolve(&self, identity: &dyn IdentityResolver) -> Caller {
        match identity.current_caller() {
            Some(principal) => Caller {
                role: self.role_of(&principal),
                principal: Some(principal),
            },
            None => Caller::anonymous(),
        }
    }

    /// Grant `Admin` to the caller if `phone_number` is on the allow-list.
    ///
    /// This is a coarse allow-list, not a credential check. Returns whether
    /// the role was granted.
    pub fn admin_login(&self, caller: &Caller, phone_number: &str) -> EngineResult<bool> {
        let principal = caller.authenticated()?;
        let phone = normalize_phone(phone_number);

        if phone.is_empty() || !self.admin_phones.contains(&phone) {
            tracing::warn!(caller = %principal, "Admin login refused");
            return Ok(false);
        }

        self.roles.insert(principal.clone(), Role::Admin);
        tracing::info!(caller = %principal, "Admin role granted by phone login");
        Ok(true)
    }

    /// Assign a role to `user`. Admin only.
    pub fn assign(&self, caller: &Caller, user: &Principal, role: Role) -> EngineResult<()> {
        let admin = caller.require_admin()?;
        self.roles.insert(user.clone(), role);
        tracing::info!(admin = %admin, user = %user, role = %role, "Role assigned");
        Ok(())
    }
}
