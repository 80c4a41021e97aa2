//! Roles, resources and actions.
//!
//! All three are closed sets. Their text form (`snake_case`) is what gets
//! stored in the database and exchanged over the API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// A member's standing within an organization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Viewer,
    Billing,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Owner,
        Role::Admin,
        Role::Member,
        Role::Viewer,
        Role::Billing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Viewer => "viewer",
            Role::Billing => "billing",
        }
    }
}

/// A protectable object class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Organization,
    Member,
    Invitation,
    Billing,
    Subscription,
    Settings,
    ApiKey,
    Webhook,
    AuditLog,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::Organization,
        Resource::Member,
        Resource::Invitation,
        Resource::Billing,
        Resource::Subscription,
        Resource::Settings,
        Resource::ApiKey,
        Resource::Webhook,
        Resource::AuditLog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Organization => "organization",
            Resource::Member => "member",
            Resource::Invitation => "invitation",
            Resource::Billing => "billing",
            Resource::Subscription => "subscription",
            Resource::Settings => "settings",
            Resource::ApiKey => "api_key",
            Resource::Webhook => "webhook",
            Resource::AuditLog => "audit_log",
        }
    }
}

/// An operation on a resource. `Manage` implies every other action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Manage,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Manage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }
}

/// Returned when a tag string does not name a known role, resource or action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownTag {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownTag {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl FromStr for Role {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownTag::new("role", s))
    }
}

impl FromStr for Resource {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownTag::new("resource", s))
    }
}

impl FromStr for Action {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownTag::new("action", s))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const GRANTED: &str = "true";
const REVOKED: &str = "false";

/// Encodes an override flag for the `custom_permission.granted` text column.
pub fn encode_granted(granted: bool) -> &'static str {
    if granted {
        GRANTED
    } else {
        REVOKED
    }
}

/// Decodes the `custom_permission.granted` column. Only the exact sentinel
/// `"true"` grants; anything else denies.
pub fn decode_granted(raw: &str) -> bool {
    raw == GRANTED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_parse_from_their_text_form() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        for resource in Resource::ALL {
            assert_eq!(resource.as_str().parse::<Resource>(), Ok(resource));
        }
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
    }

    #[test]
    fn test_unknown_tags_are_rejected() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "role");
        assert_eq!(err.value, "superuser");

        assert!("apikey".parse::<Resource>().is_err());
        assert!("Read".parse::<Action>().is_err());
        assert!("".parse::<Action>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Resource::AuditLog).unwrap(),
            "\"audit_log\""
        );
        assert_eq!(
            serde_json::from_str::<Resource>("\"api_key\"").unwrap(),
            Resource::ApiKey
        );
        assert_eq!(serde_json::to_string(&Role::Billing).unwrap(), "\"billing\"");
    }

    #[test]
    fn test_granted_flag_fails_closed() {
        assert!(decode_granted("true"));
        assert!(!decode_granted("false"));
        assert!(!decode_granted("TRUE"));
        assert!(!decode_granted("yes"));
        assert!(!decode_granted("1"));
        assert!(!decode_granted(""));
    }

    #[test]
    fn test_granted_flag_encoding() {
        assert_eq!(encode_granted(true), "true");
        assert_eq!(encode_granted(false), "false");
        assert!(decode_granted(encode_granted(true)));
        assert!(!decode_granted(encode_granted(false)));
    }
}
