//! Domain layer containing business entities and logic.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`verification_request`] - Message contract of the verification queue
//! - [`verification_worker`] - Consumer that records safety verdicts
//! - [`click_event`] - Click tracking event model
//! - [`click_worker`] - Asynchronous click processing worker
//!
//! # Verification Flow
//!
//! 1. [`crate::application::services::CreationService`] stores an `Unknown` record
//! 2. A [`verification_request::VerificationRequest`] is published to the broker
//! 3. [`verification_worker::VerificationWorker`] checks the target and writes the verdict
//! 4. [`crate::application::services::GateService`] serves or rejects based on the verdict
//!
//! # Click Processing Flow
//!
//! 1. The gate lets a redirect through
//! 2. [`click_event::ClickEvent`] is sent to a bounded channel
//! 3. [`click_worker::run_click_worker`] persists it with retry logic

pub mod click_event;
pub mod click_worker;
pub mod entities;
pub mod repositories;
pub mod verification_request;
pub mod verification_worker;
