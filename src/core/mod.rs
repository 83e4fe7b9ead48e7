//! Core pipeline pieces: configuration, errors, data model, orchestrator.

pub mod config;
pub mod error;
pub mod models;
pub mod prospector;
