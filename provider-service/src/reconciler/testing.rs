//! In-memory stand-in for the InfluxDB control API.
//!
//! Interprets the statements the builder renders, records every statement it
//! receives and can be told to fail the next statement with a given prefix.
//! Duplicate creates behave like InfluxDB 1.x: an identical repeat succeeds.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use common::models::Privilege;
use common::statement::Statement;
use common::utils::unquote_identifier;
use serde_json::json;

use crate::executor::{Series, StatementExecutor};

#[derive(Debug, Default)]
struct UserRecord {
    password: String,
    admin: bool,
    privileges: BTreeMap<String, Privilege>,
}

#[derive(Debug, Default)]
struct Server {
    databases: BTreeSet<String>,
    users: BTreeMap<String, UserRecord>,
    continuous_queries: BTreeMap<(String, String), String>,
    log: Vec<String>,
    failures: Vec<(String, AppError)>,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct FakeInflux {
    server: Arc<Mutex<Server>>,
}

impl FakeInflux {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn shared(&self) -> Arc<dyn StatementExecutor> {
        Arc::new(self.clone())
    }

    /// Mutating statements received so far, in order. `SHOW` listings are left out.
    pub(crate) fn log(&self) -> Vec<String> {
        self.server
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|s| !s.starts_with("SHOW "))
            .cloned()
            .collect()
    }

    pub(crate) fn clear_log(&self) {
        self.server.lock().unwrap().log.clear();
    }

    /// Fails the next statement starting with `prefix`.
    pub(crate) fn fail_next(&self, prefix: &str, error: AppError) {
        self.server
            .lock()
            .unwrap()
            .failures
            .push((prefix.to_string(), error));
    }

    pub(crate) fn password_of(&self, user: &str) -> Option<String> {
        self.server
            .lock()
            .unwrap()
            .users
            .get(user)
            .map(|u| u.password.clone())
    }

    pub(crate) fn drop_database_out_of_band(&self, name: &str) {
        self.server.lock().unwrap().databases.remove(name);
    }
}

#[async_trait]
impl StatementExecutor for FakeInflux {
    async fn query(&self, statement: &Statement) -> AppResult<Vec<Series>> {
        let mut server = self.server.lock().unwrap();
        let text = statement.as_str();
        server.log.push(text.to_string());
        if let Some(idx) = server.failures.iter().position(|(p, _)| text.starts_with(p.as_str())) {
            return Err(server.failures.remove(idx).1);
        }
        server.apply(text)
    }
}

fn semantic(msg: impl Into<String>) -> AppError {
    AppError::Semantic(msg.into())
}

fn ident(input: &str) -> AppResult<(String, &str)> {
    unquote_identifier(input).ok_or_else(|| semantic(format!("error parsing query: {}", input)))
}

fn keyword<'a>(input: &'a str, kw: &str) -> AppResult<&'a str> {
    input
        .strip_prefix(kw)
        .ok_or_else(|| semantic(format!("error parsing query: expected {:?} at {:?}", kw, input)))
}

impl Server {
    fn apply(&mut self, text: &str) -> AppResult<Vec<Series>> {
        if text == "SHOW DATABASES" {
            let values = self.databases.iter().map(|d| vec![json!(d)]).collect();
            return Ok(vec![Series::new("databases", &["name"], values)]);
        }
        if text == "SHOW USERS" {
            let values = self
                .users
                .iter()
                .map(|(name, u)| vec![json!(name), json!(u.admin)])
                .collect();
            return Ok(vec![Series::new("", &["user", "admin"], values)]);
        }
        if text == "SHOW CONTINUOUS QUERIES" {
            return Ok(self
                .databases
                .iter()
                .map(|db| {
                    let values = self
                        .continuous_queries
                        .iter()
                        .filter(|((d, _), _)| d == db)
                        .map(|((d, n), q)| {
                            vec![
                                json!(n),
                                json!(format!("CREATE CONTINUOUS QUERY {} ON {} BEGIN {} END", n, d, q)),
                            ]
                        })
                        .collect();
                    Series::new(db.clone(), &["name", "query"], values)
                })
                .collect());
        }
        if let Some(rest) = text.strip_prefix("SHOW GRANTS FOR ") {
            let (name, _) = ident(rest)?;
            let user = self.users.get(&name).ok_or_else(|| semantic("user not found"))?;
            let values = self
                .databases
                .iter()
                .map(|db| {
                    let privilege = match user.privileges.get(db) {
                        Some(Privilege::All) => "ALL PRIVILEGES",
                        Some(p) => p.keyword(),
                        None => "NO PRIVILEGES",
                    };
                    vec![json!(db), json!(privilege)]
                })
                .collect();
            return Ok(vec![Series::new("", &["database", "privilege"], values)]);
        }
        if let Some(rest) = text.strip_prefix("CREATE DATABASE ") {
            let (name, _) = ident(rest)?;
            self.databases.insert(name);
            return Ok(vec![]);
        }
        if let Some(rest) = text.strip_prefix("DROP DATABASE ") {
            let (name, _) = ident(rest)?;
            if !self.databases.remove(&name) {
                return Err(semantic(format!("database not found: {}", name)));
            }
            self.continuous_queries.retain(|(d, _), _| d != &name);
            return Ok(vec![]);
        }
        if let Some(rest) = text.strip_prefix("CREATE USER ") {
            let (name, rest) = ident(rest)?;
            let (password, rest) = ident(keyword(rest, " WITH PASSWORD ")?)?;
            let admin = rest == " WITH ALL PRIVILEGES";
            if let Some(existing) = self.users.get(&name) {
                if existing.password == password && existing.admin == admin {
                    return Ok(vec![]);
                }
                return Err(semantic("user already exists"));
            }
            self.users.insert(
                name,
                UserRecord {
                    password,
                    admin,
                    privileges: BTreeMap::new(),
                },
            );
            return Ok(vec![]);
        }
        if let Some(rest) = text.strip_prefix("DROP USER ") {
            let (name, _) = ident(rest)?;
            self.users.remove(&name).ok_or_else(|| semantic("user not found"))?;
            return Ok(vec![]);
        }
        if let Some(rest) = text.strip_prefix("SET PASSWORD FOR ") {
            let (name, rest) = ident(rest)?;
            let (password, _) = ident(keyword(rest, " = ")?)?;
            self.user_mut(&name)?.password = password;
            return Ok(vec![]);
        }
        if let Some(rest) = text.strip_prefix("GRANT ALL PRIVILEGES TO ") {
            let (name, _) = ident(rest)?;
            self.user_mut(&name)?.admin = true;
            return Ok(vec![]);
        }
        if let Some(rest) = text.strip_prefix("REVOKE ALL PRIVILEGES FROM ") {
            let (name, _) = ident(rest)?;
            self.user_mut(&name)?.admin = false;
            return Ok(vec![]);
        }
        if let Some(rest) = text.strip_prefix("GRANT ") {
            let (privilege, rest) = rest
                .split_once(" ON ")
                .ok_or_else(|| semantic("error parsing query"))?;
            let (database, rest) = ident(rest)?;
            let (name, _) = ident(keyword(rest, " TO ")?)?;
            let privilege = privilege.parse::<Privilege>().map_err(semantic)?;
            if !self.databases.contains(&database) {
                return Err(semantic(format!("database not found: {}", database)));
            }
            self.user_mut(&name)?.privileges.insert(database, privilege);
            return Ok(vec![]);
        }
        if let Some(rest) = text.strip_prefix("REVOKE ") {
            let (_, rest) = rest
                .split_once(" ON ")
                .ok_or_else(|| semantic("error parsing query"))?;
            let (database, rest) = ident(rest)?;
            let (name, _) = ident(keyword(rest, " FROM ")?)?;
            self.user_mut(&name)?.privileges.remove(&database);
            return Ok(vec![]);
        }
        if let Some(rest) = text.strip_prefix("CREATE CONTINUOUS QUERY ") {
            let (name, rest) = ident(rest)?;
            let (database, rest) = ident(keyword(rest, " ON ")?)?;
            let body = keyword(rest, " BEGIN ")?
                .strip_suffix(" END")
                .ok_or_else(|| semantic("error parsing query: expected END"))?;
            if !self.databases.contains(&database) {
                return Err(semantic(format!("database not found: {}", database)));
            }
            let key = (database, name);
            if let Some(existing) = self.continuous_queries.get(&key) {
                if existing == body {
                    return Ok(vec![]);
                }
                return Err(semantic("continuous query already exists"));
            }
            self.continuous_queries.insert(key, body.to_string());
            return Ok(vec![]);
        }
        if let Some(rest) = text.strip_prefix("DROP CONTINUOUS QUERY ") {
            let (name, rest) = ident(rest)?;
            let (database, _) = ident(keyword(rest, " ON ")?)?;
            if !self.databases.contains(&database) {
                return Err(semantic(format!("database not found: {}", database)));
            }
            self.continuous_queries
                .remove(&(database, name))
                .ok_or_else(|| semantic("continuous query not found"))?;
            return Ok(vec![]);
        }
        Err(semantic(format!("error parsing query: {}", text)))
    }

    fn user_mut(&mut self, name: &str) -> AppResult<&mut UserRecord> {
        self.users.get_mut(name).ok_or_else(|| semantic("user not found"))
    }
}
