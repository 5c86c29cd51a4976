//! User resource model.

use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Privilege a user can hold on a single database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Privilege {
    Read,
    Write,
    All,
}

impl Privilege {
    /// Keyword used in `GRANT`/`REVOKE` statements.
    pub fn keyword(&self) -> &'static str {
        match self {
            Privilege::Read => "READ",
            Privilege::Write => "WRITE",
            Privilege::All => "ALL",
        }
    }
}

impl std::fmt::Display for Privilege {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Parses the privilege column of `SHOW GRANTS` as well as statement keywords.
impl FromStr for Privilege {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "READ" => Ok(Privilege::Read),
            "WRITE" => Ok(Privilege::Write),
            "ALL" | "ALL PRIVILEGES" => Ok(Privilege::All),
            other => Err(format!("unknown privilege {:?}", other)),
        }
    }
}

/// A privilege on one database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub struct Grant {
    pub database: String,
    pub privilege: Privilege,
}

impl Grant {
    pub fn new(database: impl Into<String>, privilege: Privilege) -> Self {
        Self {
            database: database.into(),
            privilege,
        }
    }
}

/// A user account.
///
/// The password cannot be read back from the server; observed state carries
/// over whatever was last declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct UserResource {
    #[validate(length(min = 1, message = "User name is required"))]
    pub name: String,
    #[serde(default)]
    pub password: String,
    /// Cluster-wide admin (`ALL PRIVILEGES`).
    #[serde(default)]
    pub admin: bool,
    /// Per-database privileges; at most one per database.
    #[serde(default)]
    #[validate(custom(function = "validate_grants"))]
    pub grants: BTreeSet<Grant>,
}

impl UserResource {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            admin: false,
            grants: BTreeSet::new(),
        }
    }

    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_grant(mut self, database: impl Into<String>, privilege: Privilege) -> Self {
        self.grants.insert(Grant::new(database, privilege));
        self
    }

    /// Privilege held on `database`, if any.
    pub fn privilege_on(&self, database: &str) -> Option<Privilege> {
        self.grants
            .iter()
            .find(|g| g.database == database)
            .map(|g| g.privilege)
    }
}

fn validate_grants(grants: &BTreeSet<Grant>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for grant in grants {
        if grant.database.is_empty() {
            return Err(ValidationError::new("empty_database")
                .with_message("Grant database is required".into()));
        }
        if !seen.insert(grant.database.as_str()) {
            return Err(ValidationError::new("duplicate_database")
                .with_message(format!("More than one grant on database {:?}", grant.database).into()));
        }
    }
    Ok(())
}
