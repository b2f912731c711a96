use qrcode::QrCode;
use qrcode::render::svg;

#[derive(Debug, thiserror::Error)]
#[error("Failed to encode QR code: {0}")]
pub struct QrError(String);

/// Turns a short URL into an image.
pub trait QrRenderer: Send + Sync {
    fn render(&self, data: &str) -> Result<Vec<u8>, QrError>;

    /// MIME type of the rendered bytes.
    fn content_type(&self) -> &'static str;
}

/// Renders QR codes as standalone SVG documents.
#[derive(Debug, Clone)]
pub struct SvgQrRenderer {
    min_size: u32,
}

impl SvgQrRenderer {
    pub fn new(min_size: u32) -> Self {
        Self { min_size }
    }
}

impl Default for SvgQrRenderer {
    fn default() -> Self {
        Self::new(200)
    }
}

impl QrRenderer for SvgQrRenderer {
    fn render(&self, data: &str) -> Result<Vec<u8>, QrError> {
        let code = QrCode::new(data.as_bytes()).map_err(|e| QrError(e.to_string()))?;
        let image = code
            .render::<svg::Color>()
            .min_dimensions(self.min_size, self.min_size)
            .build();
        Ok(image.into_bytes())
    }

    fn content_type(&self) -> &'static str {
        "image/svg+xml"
    }
}
