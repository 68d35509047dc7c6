//! Closetrack automation API server.
//!
//! Wires the automation engine to Postgres through sqlx repositories,
//! exposes the JSON API, and runs the background retry worker.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod runner;
pub mod state;
