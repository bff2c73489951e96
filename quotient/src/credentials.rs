//! Credential capability for authenticated requests.
//!
//! The client never reads ambient process state; whoever owns the session
//! token injects it through this trait. An absent token means requests go
//! out unauthenticated.

use std::sync::{PoisonError, RwLock};

pub trait CredentialProvider: Send + Sync {
    /// Current session token, if a user is signed in.
    fn token(&self) -> Option<String>;
}

/// Fixed credentials, set once at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Mutable credential slot a host application updates on login/logout.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    token: RwLock<Option<String>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn clear(&self) {
        *self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl CredentialProvider for MemoryCredentials {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
