//! Administrative statement rendering.
//!
//! Pure functions from declared attributes to InfluxQL text. Identifiers and
//! passwords are quoted with [`quote_identifier`]; continuous-query bodies are
//! embedded verbatim and must come from a trusted declaration.

use crate::models::{ContinuousQueryResource, DatabaseResource, Grant, Privilege, UserResource};
use crate::utils::quote_identifier;

const REDACTED: &str = "[REDACTED]";

/// One rendered administrative statement.
///
/// `Display` prints the redacted form so statements can be logged; the text
/// sent to the server is [`Statement::as_str`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    text: String,
    redacted: Option<String>,
}

impl Statement {
    fn new(text: String) -> Self {
        Self {
            text,
            redacted: None,
        }
    }

    fn sensitive(text: String, redacted: String) -> Self {
        Self {
            text,
            redacted: Some(redacted),
        }
    }

    /// Text sent over the wire.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Text safe to log or return to the host.
    pub fn redacted(&self) -> &str {
        self.redacted.as_deref().unwrap_or(&self.text)
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.redacted())
    }
}

// ============== Databases ==============

pub fn create_database(db: &DatabaseResource) -> Statement {
    Statement::new(format!("CREATE DATABASE {}", quote_identifier(&db.name)))
}

pub fn drop_database(name: &str) -> Statement {
    Statement::new(format!("DROP DATABASE {}", quote_identifier(name)))
}

pub fn show_databases() -> Statement {
    Statement::new("SHOW DATABASES".to_string())
}

// ============== Users ==============

/// `CREATE USER` with the admin flag folded in. Grants are separate statements.
pub fn create_user(user: &UserResource) -> Statement {
    let name = quote_identifier(&user.name);
    let suffix = if user.admin { " WITH ALL PRIVILEGES" } else { "" };
    Statement::sensitive(
        format!(
            "CREATE USER {} WITH PASSWORD {}{}",
            name,
            quote_identifier(&user.password),
            suffix
        ),
        format!("CREATE USER {} WITH PASSWORD {}{}", name, REDACTED, suffix),
    )
}

pub fn drop_user(name: &str) -> Statement {
    Statement::new(format!("DROP USER {}", quote_identifier(name)))
}

pub fn set_password(name: &str, password: &str) -> Statement {
    let name = quote_identifier(name);
    Statement::sensitive(
        format!("SET PASSWORD FOR {} = {}", name, quote_identifier(password)),
        format!("SET PASSWORD FOR {} = {}", name, REDACTED),
    )
}

pub fn grant_admin(name: &str) -> Statement {
    Statement::new(format!("GRANT ALL PRIVILEGES TO {}", quote_identifier(name)))
}

pub fn revoke_admin(name: &str) -> Statement {
    Statement::new(format!("REVOKE ALL PRIVILEGES FROM {}", quote_identifier(name)))
}

pub fn grant(user: &str, grant: &Grant) -> Statement {
    Statement::new(format!(
        "GRANT {} ON {} TO {}",
        grant.privilege.keyword(),
        quote_identifier(&grant.database),
        quote_identifier(user)
    ))
}

pub fn revoke(user: &str, database: &str, privilege: Privilege) -> Statement {
    Statement::new(format!(
        "REVOKE {} ON {} FROM {}",
        privilege.keyword(),
        quote_identifier(database),
        quote_identifier(user)
    ))
}

pub fn show_users() -> Statement {
    Statement::new("SHOW USERS".to_string())
}

pub fn show_grants(name: &str) -> Statement {
    Statement::new(format!("SHOW GRANTS FOR {}", quote_identifier(name)))
}

// ============== Continuous queries ==============

pub fn create_continuous_query(cq: &ContinuousQueryResource) -> Statement {
    Statement::new(format!(
        "CREATE CONTINUOUS QUERY {} ON {} BEGIN {} END",
        quote_identifier(&cq.name),
        quote_identifier(&cq.database),
        cq.query
    ))
}

pub fn drop_continuous_query(name: &str, database: &str) -> Statement {
    Statement::new(format!(
        "DROP CONTINUOUS QUERY {} ON {}",
        quote_identifier(name),
        quote_identifier(database)
    ))
}

pub fn show_continuous_queries() -> Statement {
    Statement::new("SHOW CONTINUOUS QUERIES".to_string())
}

// ============== Dispatch by kind ==============

/// Declared configuration of any supported kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceConfig<'a> {
    Database(&'a DatabaseResource),
    User(&'a UserResource),
    ContinuousQuery(&'a ContinuousQueryResource),
}

impl ResourceConfig<'_> {
    /// Statements that bring the resource into existence, in execution order.
    pub fn create_statements(&self) -> Vec<Statement> {
        match self {
            ResourceConfig::Database(db) => vec![create_database(db)],
            ResourceConfig::User(user) => std::iter::once(create_user(user))
                .chain(user.grants.iter().map(|g| grant(&user.name, g)))
                .collect(),
            ResourceConfig::ContinuousQuery(cq) => vec![create_continuous_query(cq)],
        }
    }

    /// Statement that removes the resource.
    pub fn drop_statement(&self) -> Statement {
        match self {
            ResourceConfig::Database(db) => drop_database(&db.name),
            ResourceConfig::User(user) => drop_user(&user.name),
            ResourceConfig::ContinuousQuery(cq) => drop_continuous_query(&cq.name, &cq.database),
        }
    }
}
