//! Business logic services for the application layer.

pub mod creation_service;
pub mod gate_service;
pub mod link_info_service;
pub mod qr_service;

pub use creation_service::{CreatedShortUrl, CreationService, VerificationStatus};
pub use gate_service::GateService;
pub use link_info_service::{LinkInfo, LinkInfoService};
pub use qr_service::{PrefetchOutcome, PrefetchPolicy, QrImage, QrService};
