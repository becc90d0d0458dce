//! Caller identity gate
//!
//! Sessions are owned by the serving layer; the table service only sees an
//! already-resolved [`CallerIdentity`] and uses it as a precondition.

use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult, ErrorCode};

/// Staff role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Waiter,
}

/// Identity of the caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub is_authenticated: bool,
    pub role: Role,
}

impl CallerIdentity {
    pub fn admin() -> Self {
        Self {
            is_authenticated: true,
            role: Role::Admin,
        }
    }

    pub fn waiter() -> Self {
        Self {
            is_authenticated: true,
            role: Role::Waiter,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            is_authenticated: false,
            role: Role::Waiter,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated && self.role == Role::Admin
    }

    /// Any logged-in staff member
    pub fn require_authenticated(&self) -> AppResult<()> {
        if !self.is_authenticated {
            return Err(AppError::not_authenticated());
        }
        Ok(())
    }

    /// Admin only
    pub fn require_admin(&self) -> AppResult<()> {
        self.require_authenticated()?;
        if self.role != Role::Admin {
            return Err(AppError::new(ErrorCode::AdminRequired));
        }
        Ok(())
    }
}

/// Resolves the identity of the current caller (session lookup, token, ...)
pub trait IdentityProvider: Send + Sync {
    fn caller_identity(&self) -> CallerIdentity;
}

impl IdentityProvider for CallerIdentity {
    fn caller_identity(&self) -> CallerIdentity {
        *self
    }
}
