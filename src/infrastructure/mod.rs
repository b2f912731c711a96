//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for persistence, messaging, caching, reputation
//! checks and QR rendering.
//!
//! # Modules
//!
//! - [`cache`] - QR artifact caches (Redis and in-memory)
//! - [`messaging`] - Verification request transport (Redis and in-memory)
//! - [`persistence`] - PostgreSQL and in-memory repositories
//! - [`qr`] - QR code rendering
//! - [`safety`] - Reputation check clients

pub mod cache;
pub mod messaging;
pub mod persistence;
pub mod qr;
pub mod safety;
