//! Database resource model.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A database. Its name is its whole identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct DatabaseResource {
    /// Database name.
    #[validate(length(min = 1, message = "Database name is required"))]
    pub name: String,
}

impl DatabaseResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
