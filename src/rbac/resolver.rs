//! Permission resolution.
//!
//! Resolution order for a single check:
//! 1. No membership in the organization: denied
//! 2. A custom override for the exact resource and action decides outright
//! 3. Otherwise the role's default table entry, where `manage` allows everything.
//!    A member whose stored role is unrecognized has no entries.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::store::{CustomPermission, PermissionStore};
use crate::telemetry::record_permission_check;

use super::error::AuthzError;
use super::policy::{EffectivePermissions, PermissionTable};
use super::types::{Action, Resource, Role};

/// Why a check came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    NotAMember,
    GrantedByOverride,
    DeniedByOverride,
    GrantedByManage,
    GrantedByRole,
    NotGranted,
    UnknownResource,
    UnknownAction,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::NotAMember => "not_a_member",
            DecisionReason::GrantedByOverride => "granted_by_override",
            DecisionReason::DeniedByOverride => "denied_by_override",
            DecisionReason::GrantedByManage => "granted_by_manage",
            DecisionReason::GrantedByRole => "granted_by_role",
            DecisionReason::NotGranted => "not_granted",
            DecisionReason::UnknownResource => "unknown_resource",
            DecisionReason::UnknownAction => "unknown_action",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Decision {
    pub allowed: bool,
    pub reason: DecisionReason,
}

impl Decision {
    fn allow(reason: DecisionReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// Arguments for [`AuthorizationResolver::require_permission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionCheck {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub resource: Resource,
    pub action: Action,
}

/// Decides a check for a known member. Overrides beat the table.
pub fn decide(
    table: &PermissionTable,
    role: Option<Role>,
    resource: Resource,
    action: Action,
    custom: Option<&CustomPermission>,
) -> Decision {
    if let Some(custom) = custom {
        return if custom.granted {
            Decision::allow(DecisionReason::GrantedByOverride)
        } else {
            Decision::deny(DecisionReason::DeniedByOverride)
        };
    }

    let actions = role.map_or(&[][..], |role| table.actions(role, resource));
    if actions.contains(&Action::Manage) {
        Decision::allow(DecisionReason::GrantedByManage)
    } else if actions.contains(&action) {
        Decision::allow(DecisionReason::GrantedByRole)
    } else {
        Decision::deny(DecisionReason::NotGranted)
    }
}

/// Applies overrides to a copy of the role defaults, in the order given.
pub fn apply_overrides(
    mut permissions: EffectivePermissions,
    overrides: &[CustomPermission],
) -> EffectivePermissions {
    for custom in overrides {
        let actions = permissions.entry(custom.resource).or_default();
        if custom.granted {
            if !actions.contains(&custom.action) {
                actions.push(custom.action);
            }
        } else {
            actions.retain(|a| *a != custom.action);
        }
    }
    permissions
}

#[derive(Clone)]
pub struct AuthorizationResolver {
    store: Arc<dyn PermissionStore>,
    table: Arc<PermissionTable>,
}

impl AuthorizationResolver {
    pub fn new(store: Arc<dyn PermissionStore>, table: PermissionTable) -> Self {
        Self {
            store,
            table: Arc::new(table),
        }
    }

    pub fn with_defaults(store: Arc<dyn PermissionStore>) -> Self {
        Self::new(store, PermissionTable::defaults())
    }

    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }

    pub fn table(&self) -> &PermissionTable {
        &self.table
    }

    /// Full check with the reason attached.
    pub fn check(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        resource: Resource,
        action: Action,
    ) -> Result<Decision, AuthzError> {
        let start = Instant::now();

        let decision = match self.store.find_membership(user_id, organization_id)? {
            None => Decision::deny(DecisionReason::NotAMember),
            Some(membership) => {
                let custom = self
                    .store
                    .find_custom_permission(membership.id, resource, action)?;
                decide(
                    &self.table,
                    membership.role,
                    resource,
                    action,
                    custom.as_ref(),
                )
            }
        };

        debug!(
            user_id = %user_id,
            organization_id = %organization_id,
            resource = %resource,
            action = %action,
            allowed = decision.allowed,
            reason = decision.reason.as_str(),
            "Permission check"
        );
        record_permission_check(decision.reason.as_str(), decision.allowed, start.elapsed());

        Ok(decision)
    }

    /// Like [`check`](Self::check) but takes the resource and action as text.
    /// Unknown tags are denied rather than rejected.
    pub fn check_raw(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        resource: &str,
        action: &str,
    ) -> Result<Decision, AuthzError> {
        let Ok(resource) = resource.parse::<Resource>() else {
            return Ok(Decision::deny(DecisionReason::UnknownResource));
        };
        let Ok(action) = action.parse::<Action>() else {
            return Ok(Decision::deny(DecisionReason::UnknownAction));
        };
        self.check(user_id, organization_id, resource, action)
    }

    pub fn has_permission(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        resource: Resource,
        action: Action,
    ) -> Result<bool, AuthzError> {
        Ok(self
            .check(user_id, organization_id, resource, action)?
            .allowed)
    }

    pub fn require_permission(&self, params: PermissionCheck) -> Result<(), AuthzError> {
        if self.has_permission(
            params.user_id,
            params.organization_id,
            params.resource,
            params.action,
        )? {
            return Ok(());
        }

        warn!(
            user_id = %params.user_id,
            organization_id = %params.organization_id,
            resource = %params.resource,
            action = %params.action,
            "Permission denied"
        );
        Err(AuthzError::denied(params.resource, params.action))
    }

    /// Effective permissions for UI gating. Empty for non-members.
    pub fn get_user_permissions(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<EffectivePermissions, AuthzError> {
        let Some(membership) = self.store.find_membership(user_id, organization_id)? else {
            return Ok(EffectivePermissions::new());
        };

        let overrides = self.store.list_custom_permissions(membership.id)?;
        Ok(apply_overrides(
            self.table.member_permissions(membership.role),
            &overrides,
        ))
    }

    pub fn get_user_role(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Role>, AuthzError> {
        Ok(self
            .store
            .find_membership(user_id, organization_id)?
            .and_then(|m| m.role))
    }

    pub fn is_organization_owner(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, AuthzError> {
        Ok(self.get_user_role(user_id, organization_id)? == Some(Role::Owner))
    }
}
