//! SQL statement permission policy.
//!
//! Every statement in a piece of SQL text is classified and checked against two
//! disjoint sets of statement types. A type in the disallowed set is always denied.
//! Otherwise it is allowed when it is in the allowed set or the allowed set is
//! empty. Anything left over follows the explicit unlisted-statement setting.

use crate::config::{ServiceConfig, UnlistedStatements};
use crate::error::{ServerError, ServerResult};
use crate::sql::classifier::{StatementType, classify};
use std::collections::BTreeSet;

/// Outcome of checking one statement type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

/// Static statement-type policy, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct StatementPolicy {
    allowed: BTreeSet<StatementType>,
    disallowed: BTreeSet<StatementType>,
    unlisted: UnlistedStatements,
}

impl StatementPolicy {
    /// A policy that allows everything.
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Build a policy from `(token, allow)` pairs.
    ///
    /// Tokens are case-insensitive. Unknown tokens and tokens that are both
    /// allowed and disallowed are configuration errors.
    pub fn from_pairs<I, S>(pairs: I, unlisted: UnlistedStatements) -> ServerResult<Self>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        let mut allowed = BTreeSet::new();
        let mut disallowed = BTreeSet::new();

        for (token, allow) in pairs {
            let ty: StatementType = token.as_ref().parse()?;
            if allow {
                allowed.insert(ty);
            } else {
                disallowed.insert(ty);
            }
        }

        let conflicts: Vec<&str> = allowed
            .intersection(&disallowed)
            .map(|t| t.as_str())
            .collect();
        if !conflicts.is_empty() {
            return Err(ServerError::configuration(format!(
                "SQL statement types both allowed and disallowed: {}",
                conflicts.join(", ")
            )));
        }

        Ok(Self {
            allowed,
            disallowed,
            unlisted,
        })
    }

    /// Build the policy from the service configuration. `unlisted_override`
    /// (from the CLI) wins over the file's `unlisted_statements`.
    pub fn from_service_config(
        config: &ServiceConfig,
        unlisted_override: Option<UnlistedStatements>,
    ) -> ServerResult<Self> {
        let unlisted = unlisted_override
            .or(config.unlisted_statements)
            .unwrap_or_default();
        Self::from_pairs(config.permission_pairs(), unlisted)
    }

    pub fn allowed(&self) -> &BTreeSet<StatementType> {
        &self.allowed
    }

    pub fn disallowed(&self) -> &BTreeSet<StatementType> {
        &self.disallowed
    }

    pub fn unlisted(&self) -> UnlistedStatements {
        self.unlisted
    }

    /// Decide a single statement type.
    pub fn decide(&self, ty: StatementType) -> Decision {
        if self.disallowed.contains(&ty) {
            return Decision::Denied;
        }
        if self.allowed.is_empty() || self.allowed.contains(&ty) {
            return Decision::Allowed;
        }
        match self.unlisted {
            UnlistedStatements::Allow => Decision::Allowed,
            UnlistedStatements::Deny => Decision::Denied,
        }
    }

    /// Classify `sql` and authorize every statement in it.
    ///
    /// Returns the statement types on success, or an authorization error naming
    /// the first denied type.
    pub fn authorize(&self, sql: &str) -> ServerResult<Vec<StatementType>> {
        let types = classify(sql)?;
        if let Some(denied) = types
            .iter()
            .find(|t| self.decide(**t) == Decision::Denied)
        {
            tracing::warn!(statement_type = %denied, "Statement denied by policy");
            return Err(ServerError::authorization(denied.as_str()));
        }
        Ok(types)
    }
}
