//! OAuth2 credential and token authority.
//!
//! Holds everything an authorization server needs below its HTTP layer:
//!
//! - [`password`] - Argon2id secret hashing and opaque token generation
//! - [`scope`] - the scope catalogue, seeded once at bootstrap
//! - [`client`] - confidential client registration and authentication
//! - [`user`] - end-user registration and password authentication
//! - [`token`] - authorization codes, access tokens and refresh tokens
//! - [`service`] - the facade composing the above into grants
//!
//! ## Supported Flows
//!
//! - Authorization Code
//! - Resource Owner Password Credentials
//! - Client Credentials
//! - Refresh Token (rotating)

pub mod client;
pub mod password;
pub mod reaper;
pub mod scope;
pub mod service;
pub mod token;
pub mod user;

pub use client::ClientDirectory;
pub use password::{SecretHasher, generate_token};
pub use scope::ScopeRegistry;
pub use service::{OAuth2Service, TokenResponse};
pub use token::{RevocationCounts, TokenAuthority, TokenLifetimes, TokenPair};
pub use user::UserDirectory;
