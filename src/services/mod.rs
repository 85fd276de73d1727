//! Service layer for business logic
//!
//! HTTP handlers and the CLI share the same link operations.

mod link_service;

pub use link_service::{LinkService, ShortenOutcome};
