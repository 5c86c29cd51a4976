//! 语句执行器
//!
//! Sends one rendered statement and folds the response into a single
//! `AppResult`: transport failures surface as `AppError::Transport`, errors the
//! server reports inside the envelope (top level or per statement) as
//! `AppError::Semantic` with the server's message verbatim. One call is one
//! attempt.

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use common::statement::Statement;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::connection::InfluxConnection;

/// Executes administrative statements against the control API.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Runs a statement and returns the tabular payload.
    async fn query(&self, statement: &Statement) -> AppResult<Vec<Series>>;

    /// Runs a statement whose payload is irrelevant.
    async fn execute(&self, statement: &Statement) -> AppResult<()> {
        self.query(statement).await.map(|_| ())
    }
}

#[async_trait]
impl StatementExecutor for InfluxConnection {
    async fn query(&self, statement: &Statement) -> AppResult<Vec<Series>> {
        debug!(statement = %statement, "执行语句");
        self.send_query(statement.as_str()).await?.into_series()
    }
}

/// Response envelope of `/query`.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of one statement inside the envelope.
#[derive(Debug, Default, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub statement_id: u32,
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One table of results.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl QueryResponse {
    /// Checks both error layers and flattens the series of every statement.
    pub fn into_series(self) -> AppResult<Vec<Series>> {
        if let Some(error) = self.error {
            return Err(AppError::Semantic(error));
        }
        let mut series = Vec::new();
        for result in self.results {
            if let Some(error) = result.error {
                return Err(AppError::Semantic(error));
            }
            series.extend(result.series);
        }
        Ok(series)
    }
}

impl Series {
    pub fn new(name: impl Into<String>, columns: &[&str], values: Vec<Vec<Value>>) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values,
        }
    }

    /// Iterates rows with by-column access.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.values.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }
}

/// A row of a [`Series`].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    pub fn get_str(&self, column: &str) -> Option<&'a str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(Value::as_bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_level_error_is_semantic() {
        let envelope: QueryResponse =
            serde_json::from_value(json!({ "error": "authorization failed" })).unwrap();
        let err = envelope.into_series().unwrap_err();
        assert!(matches!(err, AppError::Semantic(ref m) if m == "authorization failed"));
    }

    #[test]
    fn test_statement_error_is_semantic() {
        let envelope: QueryResponse = serde_json::from_value(json!({
            "results": [{ "statement_id": 0, "error": "user already exists" }]
        }))
        .unwrap();
        let err = envelope.into_series().unwrap_err();
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_success_without_payload() {
        let envelope: QueryResponse =
            serde_json::from_value(json!({ "results": [{ "statement_id": 0 }] })).unwrap();
        assert!(envelope.into_series().unwrap().is_empty());
    }

    #[test]
    fn test_rows_by_column() {
        let envelope: QueryResponse = serde_json::from_value(json!({
            "results": [{
                "statement_id": 0,
                "series": [{ "columns": ["user", "admin"], "values": [["alice", true], ["bob", false]] }]
            }]
        }))
        .unwrap();
        let series = envelope.into_series().unwrap();
        let rows: Vec<_> = series[0].rows().collect();
        assert_eq!(rows[0].get_str("user"), Some("alice"));
        assert_eq!(rows[1].get_bool("admin"), Some(false));
        assert!(rows[0].get("missing").is_none());
    }
}
