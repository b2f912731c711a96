//! Application layer services implementing business logic.
//!
//! This layer orchestrates domain operations by coordinating repository calls,
//! the message broker, and the cache. Services consume trait objects and provide
//! a clean API for HTTP handlers.
//!
//! # Available Services
//!
//! - [`services::creation_service::CreationService`] - Short URL creation and verification dispatch
//! - [`services::gate_service::GateService`] - Safety gating of redirects
//! - [`services::qr_service::QrService`] - Gated QR codes and prefetch
//! - [`services::link_info_service::LinkInfoService`] - Record and click summaries

pub mod services;
