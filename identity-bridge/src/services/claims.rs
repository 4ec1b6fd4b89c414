//! Typed access to decoded token claims and the claim-to-authority mapping.
//!
//! Claims issued by the identity provider are loosely shaped: role lists sit
//! under `realm_access.roles` and `resource_access.<client>.roles`, and any of
//! them may be missing or of an unexpected type. Every accessor here returns an
//! empty result on a shape mismatch so a single odd claim never fails a request.

use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::models::User;

use super::token_validator::TokenRejection;

pub const ROLE_PREFIX: &str = "ROLE_";
pub const SCOPE_PREFIX: &str = "SCOPE_";
pub const ADMIN_AUTHORITY: &str = "ROLE_ADMIN";

/// Raw decoded token payload.
#[derive(Debug, Clone, Default)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Builds a claim set from any JSON value; non-objects yield an empty set.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn string_claim(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn i64_claim(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn bool_claim(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    /// String entries of `outer.inner`, e.g. `realm_access.roles`.
    pub fn nested_list_claim(&self, outer: &str, inner: &str) -> Vec<&str> {
        string_items(
            self.0
                .get(outer)
                .and_then(Value::as_object)
                .and_then(|o| o.get(inner)),
        )
    }

    /// String entries of `outer.<key>.inner`, e.g. `resource_access.<client>.roles`.
    pub fn keyed_nested_list_claim(&self, outer: &str, key: &str, inner: &str) -> Vec<&str> {
        string_items(
            self.0
                .get(outer)
                .and_then(Value::as_object)
                .and_then(|o| o.get(key))
                .and_then(Value::as_object)
                .and_then(|o| o.get(inner)),
        )
    }

    /// Space-delimited `scope` claim.
    pub fn scopes(&self) -> Vec<&str> {
        self.string_claim("scope")
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }
}

fn string_items(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// Ordered, duplicate-free authority list.
#[derive(Debug, Default)]
struct AuthoritySet {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

impl AuthoritySet {
    fn insert(&mut self, authority: String) {
        if self.seen.insert(authority.clone()) {
            self.ordered.push(authority);
        }
    }

    fn insert_role(&mut self, role: &str) {
        let role = role.trim();
        if !role.is_empty() {
            self.insert(format!("{}{}", ROLE_PREFIX, role.to_uppercase()));
        }
    }
}

/// Maps realm roles, client roles and scopes to authority strings.
#[derive(Debug, Clone)]
pub struct AuthorityMapper {
    default_client_id: String,
}

impl AuthorityMapper {
    pub fn new(default_client_id: impl Into<String>) -> Self {
        Self {
            default_client_id: default_client_id.into(),
        }
    }

    pub fn authorities(&self, claims: &ClaimSet) -> Vec<String> {
        let mut set = AuthoritySet::default();

        for role in claims.nested_list_claim("realm_access", "roles") {
            set.insert_role(role);
        }

        let client_id = claims
            .string_claim("azp")
            .map(str::trim)
            .filter(|azp| !azp.is_empty())
            .unwrap_or(self.default_client_id.as_str());
        for role in claims.keyed_nested_list_claim("resource_access", client_id, "roles") {
            set.insert_role(role);
        }

        for scope in claims.scopes() {
            set.insert(format!("{}{}", SCOPE_PREFIX, scope));
        }

        set.ordered
    }
}

/// Identity established from a validated bearer token. Rebuilt on every request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub authorities: Vec<String>,
    pub issuer: String,
    pub issued_at: Option<i64>,
    pub expires_at: i64,
    pub scopes: Vec<String>,
}

impl Principal {
    pub fn from_claims(claims: &ClaimSet, mapper: &AuthorityMapper) -> Result<Self, TokenRejection> {
        let subject = claims
            .string_claim("sub")
            .filter(|s| !s.trim().is_empty())
            .ok_or(TokenRejection::Malformed)?;
        let issuer = claims.string_claim("iss").ok_or(TokenRejection::Malformed)?;
        let expires_at = claims.i64_claim("exp").ok_or(TokenRejection::Malformed)?;

        Ok(Self {
            subject: subject.to_string(),
            username: claims.string_claim("preferred_username").map(str::to_string),
            email: claims.string_claim("email").map(str::to_string),
            email_verified: claims.bool_claim("email_verified").unwrap_or(false),
            authorities: mapper.authorities(claims),
            issuer: issuer.to_string(),
            issued_at: claims.i64_claim("iat"),
            expires_at,
            scopes: claims.scopes().into_iter().map(str::to_string).collect(),
        })
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    pub fn is_admin(&self) -> bool {
        self.has_authority(ADMIN_AUTHORITY)
    }

    /// Local and federated records are correlated by email. A token whose
    /// email or username matches the user's email counts as the same person
    /// only once the provider has verified that email.
    pub fn is_same_user(&self, user: &User) -> bool {
        if self.subject == user.user_id.to_string() {
            return true;
        }
        if !self.email_verified {
            return false;
        }
        [self.email.as_deref(), self.username.as_deref()]
            .into_iter()
            .flatten()
            .any(|claimed| claimed.trim().eq_ignore_ascii_case(&user.email))
    }

    pub fn can_access_user(&self, user: &User) -> bool {
        self.is_admin() || self.is_same_user(user)
    }
}
