//! Snaplink - URL shortener
//!
//! Long URLs get a reversible base62 code derived from their row id. Lookups
//! go through an ordered list of tiers (bloom filter, hot cache, durable
//! store); redirects publish click events that a worker folds back into the
//! store.
//!
//! # Architecture
//! - `codec`: base62 encode / decode
//! - `storage`: durable store (SeaORM over SQLite / MySQL / PostgreSQL)
//! - `cache`: existence filter, hot cache and the shared KV backends
//! - `lookup`: tiered lookup chains
//! - `services`: shorten / resolve / preview / stats
//! - `ratelimit`: global fixed-window and per-client sliding-window limiters
//! - `analytics`: click events, transports, publisher and consumer
//! - `api`: HTTP handlers and middleware
//! - `config`: static configuration
//! - `runtime`: startup wiring and execution modes
//! - `system`: logging and signals

pub mod analytics;
pub mod api;
pub mod cache;
pub mod cli;
pub mod codec;
pub mod config;
pub mod errors;
pub mod lookup;
pub mod ratelimit;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
