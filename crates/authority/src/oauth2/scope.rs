//! Scope registry.
//!
//! The catalogue is seeded once at bootstrap and then held as an immutable
//! snapshot, so resolving a scope never touches storage and can run inside
//! any transaction.

use crate::config::ScopeSeed;
use crate::entity::oauth2_scope;
use crate::error::{OAuth2Error, Result};
use crate::store;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectionTrait, EntityTrait, QueryOrder};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
pub struct ScopeRegistry {
    catalogue: Arc<Vec<oauth2_scope::Model>>,
}

impl ScopeRegistry {
    /// Insert any seed scope not yet stored, then load the catalogue.
    ///
    /// Existing rows are left untouched, so seeding is idempotent.
    #[tracing::instrument(skip(conn, seeds), fields(count = seeds.len()))]
    pub async fn seed<C: ConnectionTrait>(conn: &C, seeds: &[ScopeSeed]) -> Result<Self> {
        for seed in seeds {
            if oauth2_scope::Entity::find_by_id(seed.name.as_str())
                .one(conn)
                .await?
                .is_some()
            {
                continue;
            }

            let scope = oauth2_scope::ActiveModel {
                name: Set(seed.name.clone()),
                is_default: Set(seed.is_default),
                created_at: Set(OffsetDateTime::now_utc()),
            };
            match scope.insert(conn).await {
                Ok(_) => tracing::info!(scope = %seed.name, default = seed.is_default, "Seeded scope"),
                // Another process seeded it first
                Err(e) if store::is_unique_violation(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Self::load(conn).await
    }

    /// Load the stored catalogue without seeding.
    pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<Self> {
        let catalogue = oauth2_scope::Entity::find()
            .order_by_asc(oauth2_scope::Column::Name)
            .all(conn)
            .await?;
        Ok(Self::from_models(catalogue))
    }

    pub fn from_models(mut catalogue: Vec<oauth2_scope::Model>) -> Self {
        catalogue.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            catalogue: Arc::new(catalogue),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.catalogue.iter().map(|s| s.name.as_str())
    }

    fn contains(&self, name: &str) -> bool {
        self.catalogue.iter().any(|s| s.name == name)
    }

    /// Space-joined default scopes, granted when a request omits scope.
    pub fn default_scope(&self) -> String {
        self.catalogue
            .iter()
            .filter(|s| s.is_default)
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Every space-separated token of `candidate` names a catalogue scope.
    ///
    /// An empty candidate is not a scope.
    pub fn scope_exists(&self, candidate: &str) -> bool {
        let mut tokens = candidate.split_whitespace().peekable();
        tokens.peek().is_some() && tokens.all(|t| self.contains(t))
    }

    /// Resolve a requested scope into the one to grant.
    ///
    /// Empty resolves to the default set, or fails when the catalogue has no
    /// default; any unknown token fails the whole request. Duplicates are dropped, order is kept.
    pub fn resolve(&self, requested: &str) -> Result<String> {
        if requested.trim().is_empty() {
            let default = self.default_scope();
            if default.is_empty() {
                return Err(OAuth2Error::InvalidScope(String::new()));
            }
            return Ok(default);
        }

        let mut granted: Vec<&str> = Vec::new();
        for token in requested.split_whitespace() {
            if !self.contains(token) {
                return Err(OAuth2Error::InvalidScope(token.to_string()));
            }
            if !granted.contains(&token) {
                granted.push(token);
            }
        }
        Ok(granted.join(" "))
    }

    /// Every token of `requested` is also in `granted`.
    pub fn is_subset(requested: &str, granted: &str) -> bool {
        let granted: Vec<&str> = granted.split_whitespace().collect();
        requested.split_whitespace().all(|t| granted.contains(&t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ScopeRegistry {
        let now = OffsetDateTime::now_utc();
        ScopeRegistry::from_models(vec![
            oauth2_scope::Model {
                name: "read_write".into(),
                is_default: false,
                created_at: now,
            },
            oauth2_scope::Model {
                name: "read".into(),
                is_default: true,
                created_at: now,
            },
            oauth2_scope::Model {
                name: "profile".into(),
                is_default: true,
                created_at: now,
            },
        ])
    }

    #[test]
    fn default_scope_is_sorted_and_joined() {
        assert_eq!(registry().default_scope(), "profile read");
    }

    #[test]
    fn scope_exists_requires_every_token() {
        let reg = registry();
        assert!(reg.scope_exists("read"));
        assert!(reg.scope_exists("read read_write"));
        assert!(!reg.scope_exists("read admin"));
        assert!(!reg.scope_exists(""));
        assert!(!reg.scope_exists("   "));
    }

    #[test]
    fn resolve_empty_uses_defaults() {
        assert_eq!(registry().resolve("").unwrap(), "profile read");
        assert_eq!(registry().resolve("  ").unwrap(), "profile read");
    }

    #[test]
    fn resolve_empty_without_defaults_fails() {
        let reg = ScopeRegistry::from_models(vec![oauth2_scope::Model {
            name: "read_write".into(),
            is_default: false,
            created_at: OffsetDateTime::now_utc(),
        }]);
        assert_eq!(reg.default_scope(), "");
        assert!(matches!(reg.resolve(""), Err(OAuth2Error::InvalidScope(_))));
        assert_eq!(reg.resolve("read_write").unwrap(), "read_write");
    }

    #[test]
    fn resolve_normalizes() {
        assert_eq!(
            registry().resolve(" read_write  read read_write").unwrap(),
            "read_write read"
        );
    }

    #[test]
    fn resolve_rejects_unknown_token() {
        match registry().resolve("read admin") {
            Err(OAuth2Error::InvalidScope(token)) => assert_eq!(token, "admin"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn subset_check() {
        assert!(ScopeRegistry::is_subset("read", "read read_write"));
        assert!(ScopeRegistry::is_subset("", "read"));
        assert!(!ScopeRegistry::is_subset("read_write", "read"));
    }
}
