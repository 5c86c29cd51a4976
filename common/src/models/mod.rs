//! Declared and observed state for every resource kind.
//!
//! The same struct serves as declared configuration (input) and observed
//! state (output); identity fields never change for a resource's lifetime.

pub mod continuous_query;
pub mod database;
pub mod user;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use continuous_query::ContinuousQueryResource;
pub use database::DatabaseResource;
pub use user::{Grant, Privilege, UserResource};

/// Resource kinds managed by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Database,
    User,
    ContinuousQuery,
}

impl ResourceKind {
    /// Name used in error messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Database => "database",
            ResourceKind::User => "user",
            ResourceKind::ContinuousQuery => "continuous query",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a read: either the rebuilt state or a drift signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ObservedState<T> {
    /// `false` when the resource was removed outside of the provider.
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<T>,
}

impl<T> ObservedState<T> {
    pub fn present(state: T) -> Self {
        Self {
            present: true,
            state: Some(state),
        }
    }

    pub fn absent() -> Self {
        Self {
            present: false,
            state: None,
        }
    }
}

impl<T> From<Option<T>> for ObservedState<T> {
    fn from(state: Option<T>) -> Self {
        match state {
            Some(state) => Self::present(state),
            None => Self::absent(),
        }
    }
}

/// Update request sent by the host: the persisted state and the new declaration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateRequest<T> {
    pub prior: T,
    pub planned: T,
    /// Permit delete-then-create when an immutable attribute changed.
    #[serde(default)]
    pub allow_recreate: bool,
}
