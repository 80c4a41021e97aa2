//! HTTP request handlers.

pub mod custom_permissions;
pub mod health;
pub mod members;
pub mod permissions;
