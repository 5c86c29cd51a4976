//! Continuous query resource model.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A continuous query bound to one database.
///
/// `name` and `database` form the identity. `query` is the statement body
/// placed between `BEGIN` and `END`; it is sent verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ContinuousQueryResource {
    #[validate(length(min = 1, message = "Continuous query name is required"))]
    pub name: String,
    /// Target database.
    #[validate(length(min = 1, message = "Target database is required"))]
    pub database: String,
    /// Raw query body.
    #[validate(length(min = 1, message = "Query body is required"))]
    pub query: String,
}

impl ContinuousQueryResource {
    pub fn new(
        name: impl Into<String>,
        database: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
            query: query.into(),
        }
    }
}
