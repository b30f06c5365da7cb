//! Access control for the ACC construction dashboard.
//!
//! User rows live in a generic keyed row store reached over HTTP. The
//! [`acl::AclEvaluator`] reads a user's row and decides whether they are
//! allowed in at all, are an administrator, or may open a given module. The
//! [`guard::ModuleGuard`] gates module pages on a precomputed
//! [`acl::Permissions`] object.
//!
//! Identity is carried by an unsigned `x-netlify-identity` header. The
//! gateway can additionally require a provider-signed bearer token for the
//! same principal; see [`identity::extractors::Caller`].

pub mod acl;
pub mod app;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod rowstore;
pub mod seed;
pub mod state;
