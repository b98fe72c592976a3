//! Credential and token authority for an OAuth2 authorization server.
//!
//! Registers and authenticates clients and users, keeps the scope catalogue,
//! and issues, validates, rotates and revokes authorization codes, access
//! tokens and refresh tokens on top of a SeaORM database.

pub mod config;
pub mod entity;
pub mod error;
pub mod oauth2;
pub mod store;

pub use error::{ErrorKind, OAuth2Error, Result};
pub use oauth2::OAuth2Service;
