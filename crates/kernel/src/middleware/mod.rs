//! HTTP middleware components.

pub mod admin_auth;

pub use admin_auth::{AdminAuth, AdminIdentity, require_admin};
