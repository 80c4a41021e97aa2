//! Default role permission table.
//!
//! The table is an immutable value handed to the resolver at construction.
//! [`PermissionTable::defaults`] is the built-in policy; deployments may load a
//! replacement from a JSON file of the form
//! `{"owner": {"organization": ["manage"], ...}, ...}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::types::{Action, Resource, Role};

/// Resource → allowed actions, in table order.
pub type EffectivePermissions = BTreeMap<Resource, Vec<Action>>;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid policy document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionTable {
    roles: BTreeMap<Role, EffectivePermissions>,
}

impl PermissionTable {
    /// The built-in policy.
    pub fn defaults() -> Self {
        let roles = Role::ALL
            .into_iter()
            .map(|role| {
                let resources = Resource::ALL
                    .into_iter()
                    .map(|resource| (resource, default_actions(role, resource).to_vec()))
                    .collect();
                (role, resources)
            })
            .collect();

        Self { roles }
    }

    /// A table in which no role holds any permission.
    pub fn empty() -> Self {
        Self {
            roles: BTreeMap::new(),
        }
        .normalized()
    }

    pub fn from_json_str(json: &str) -> Result<Self, PolicyError> {
        let table: PermissionTable = serde_json::from_str(json)?;
        Ok(table.normalized())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Loads the table from `path` when given, otherwise returns the defaults.
    pub fn load(path: Option<&str>) -> Result<Self, PolicyError> {
        match path {
            Some(p) => Self::from_json_file(p),
            None => Ok(Self::defaults()),
        }
    }

    /// Replaces the action list for one role and resource.
    pub fn with_actions(
        mut self,
        role: Role,
        resource: Resource,
        actions: impl IntoIterator<Item = Action>,
    ) -> Self {
        let mut list: Vec<Action> = Vec::new();
        for action in actions {
            if !list.contains(&action) {
                list.push(action);
            }
        }
        self.roles.entry(role).or_default().insert(resource, list);
        self
    }

    /// Actions listed for `role` on `resource`. Empty when there is no entry.
    pub fn actions(&self, role: Role, resource: Resource) -> &[Action] {
        self.roles
            .get(&role)
            .and_then(|resources| resources.get(&resource))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the table alone allows `action`. A listed `manage` allows
    /// every action on that resource.
    pub fn allows(&self, role: Role, resource: Resource, action: Action) -> bool {
        let actions = self.actions(role, resource);
        actions.contains(&Action::Manage) || actions.contains(&action)
    }

    /// A copy of the role's full resource map, every resource present.
    pub fn role_permissions(&self, role: Role) -> EffectivePermissions {
        Resource::ALL
            .into_iter()
            .map(|resource| (resource, self.actions(role, resource).to_vec()))
            .collect()
    }

    /// Like [`role_permissions`](Self::role_permissions), with every resource
    /// empty when the role is unknown.
    pub fn member_permissions(&self, role: Option<Role>) -> EffectivePermissions {
        match role {
            Some(role) => self.role_permissions(role),
            None => Resource::ALL
                .into_iter()
                .map(|resource| (resource, Vec::new()))
                .collect(),
        }
    }

    // Every role gets an entry for every resource, and duplicate actions
    // from hand-written documents are dropped.
    fn normalized(mut self) -> Self {
        for role in Role::ALL {
            let resources = self.roles.entry(role).or_default();
            for resource in Resource::ALL {
                let actions = resources.entry(resource).or_default();
                let mut seen = Vec::with_capacity(actions.len());
                actions.retain(|a| {
                    if seen.contains(a) {
                        false
                    } else {
                        seen.push(*a);
                        true
                    }
                });
            }
        }
        self
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::defaults()
    }
}

fn default_actions(role: Role, resource: Resource) -> &'static [Action] {
    const CRUD: &[Action] = &[Action::Create, Action::Read, Action::Update, Action::Delete];
    const READ: &[Action] = &[Action::Read];
    const READ_UPDATE: &[Action] = &[Action::Read, Action::Update];
    const NONE: &[Action] = &[];

    match role {
        Role::Owner => match resource {
            Resource::AuditLog => READ,
            _ => &[Action::Manage],
        },
        Role::Admin => match resource {
            Resource::Organization | Resource::Settings => READ_UPDATE,
            Resource::Member | Resource::Invitation | Resource::ApiKey | Resource::Webhook => CRUD,
            Resource::Billing | Resource::Subscription | Resource::AuditLog => READ,
        },
        Role::Member => match resource {
            Resource::Organization | Resource::Member | Resource::Settings | Resource::Webhook => {
                READ
            }
            Resource::ApiKey => &[Action::Create, Action::Read],
            Resource::Invitation
            | Resource::Billing
            | Resource::Subscription
            | Resource::AuditLog => NONE,
        },
        Role::Viewer => match resource {
            Resource::Organization | Resource::Member | Resource::Settings => READ,
            Resource::Invitation
            | Resource::Billing
            | Resource::Subscription
            | Resource::ApiKey
            | Resource::Webhook
            | Resource::AuditLog => NONE,
        },
        Role::Billing => match resource {
            Resource::Organization => READ,
            Resource::Billing | Resource::Subscription => {
                &[Action::Read, Action::Update, Action::Manage]
            }
            Resource::Member
            | Resource::Invitation
            | Resource::Settings
            | Resource::ApiKey
            | Resource::Webhook
            | Resource::AuditLog => NONE,
        },
    }
}
