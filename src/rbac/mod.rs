//! Role-based authorization for organization members.

pub mod error;
pub mod policy;
pub mod resolver;
pub mod types;

pub use error::AuthzError;
pub use policy::{EffectivePermissions, PermissionTable, PolicyError};
pub use resolver::{
    apply_overrides, decide, AuthorizationResolver, Decision, DecisionReason, PermissionCheck,
};
pub use types::{decode_granted, encode_granted, Action, Resource, Role, UnknownTag};
