//! Administrative authorization seam.
//!
//! Bulk invalidation and cache enumeration are administrator operations.
//! The cache itself has no notion of users; it asks an [`AdminGate`] and
//! treats any backend failure as a denial.

use std::collections::HashSet;
use std::error::Error as StdError;

use thiserror::Error;

/// Errors from the underlying authorization backend.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("authorization backend unavailable")]
    Unavailable(#[source] Box<dyn StdError + Send + Sync>),
    #[error("principal could not be resolved")]
    UnknownPrincipal,
}

/// Authorization context attached to administrative calls and cache events.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// The acting principal, if any.
    pub principal: Option<String>,
    /// Set on contexts minted by the event source for automated
    /// invalidation; grants the repository purge without an interactive
    /// administrator.
    pub event_controlled: bool,
}

impl AuthContext {
    /// Context for an interactive principal.
    pub fn principal(principal: impl Into<String>) -> Self {
        Self {
            principal: Some(principal.into()),
            event_controlled: false,
        }
    }

    /// Context minted by the event source for automated purges.
    pub fn event_controlled() -> Self {
        Self {
            principal: None,
            event_controlled: true,
        }
    }

    /// Context with no principal and no event authority.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Authorizes administrative cache operations.
pub trait AdminGate: Send + Sync {
    /// Whether the context is allowed to perform administrative operations.
    ///
    /// Callers inside the cache downgrade `Err` to "not authorized"; the
    /// error is for the gate's own observability.
    fn is_authorized(&self, ctx: &AuthContext) -> Result<bool, GateError>;
}

/// Gate backed by a fixed set of administrator principals.
#[derive(Debug, Default)]
pub struct StaticGate {
    admins: HashSet<String>,
}

impl StaticGate {
    pub fn new(admins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
        }
    }
}

impl AdminGate for StaticGate {
    fn is_authorized(&self, ctx: &AuthContext) -> Result<bool, GateError> {
        match &ctx.principal {
            Some(principal) => Ok(self.admins.contains(principal)),
            None => Ok(false),
        }
    }
}
