//! QR code rendering.

mod svg_renderer;

pub use svg_renderer::{QrError, QrRenderer, SvgQrRenderer};
