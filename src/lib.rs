//! Phone Number OSINT Library
//!
//! Normalizes a phone number, probes external sources concurrently (with a
//! durable result cache in front of them), detects digit-pattern anomalies and
//! folds everything into a weighted 0-100 risk score.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Domain logic (normalization, patterns, scoring, assembly).
//! - `data`: Result cache storage.
//! - `integrations`: External source probes.
//! - `analysis`: Engine entry point and record assembly.
//! - `cache`: Result cache trait and SQLite implementation.
//! - `cache_validator`: Checksums for persisted results.
//! - `circuit_breaker`: Per-probe circuit breakers.
//! - `config`: Configuration management.
//! - `db`: SQLite pool and schema.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `normalizer`: Raw input to canonical number.
//! - `patterns`: Digit-pattern detection.
//! - `probes`: Probe trait and failure taxonomy.
//! - `risk`: Risk scoring.
//! - `scheduler`: Concurrent, cached, single-flight probe execution.
//! - `services`: Concrete probe clients.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod analysis;
pub mod cache;
pub mod cache_validator;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod patterns;
pub mod probes;
pub mod risk;
pub mod scheduler;
pub mod services;

pub use analysis::IntelEngine;
pub use errors::OsintError;
pub use models::IntelligenceRecord;
