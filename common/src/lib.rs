//! Shared building blocks for the InfluxDB provider.
//!
//! - `config`: connection and server settings loaded from the environment
//! - `errors`: the error taxonomy surfaced to the orchestrating host
//! - `models`: declared and observed state for each resource kind
//! - `statement`: rendering of administrative statements
//! - `response`: the JSON envelope returned by the HTTP surface

pub mod config;
pub mod errors;
pub mod models;
pub mod response;
pub mod statement;
pub mod utils;
