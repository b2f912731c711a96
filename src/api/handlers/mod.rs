//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.

pub mod create_link;
pub mod health;
pub mod link_info;
pub mod qr;
pub mod redirect;

pub use create_link::create_link_handler;
pub use health::health_handler;
pub use link_info::link_info_handler;
pub use qr::qr_handler;
pub use redirect::redirect_handler;
