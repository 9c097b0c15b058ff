//! Pairing code to QR image rendering.

use std::io::Cursor;

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    image::{DynamicImage, ImageFormat, Luma},
    qrcode::QrCode,
};

use crate::error::{Error, Result};

/// Turns a pairing code into something a browser can display.
pub trait PairingRenderer: Send + Sync {
    fn render(&self, code: &str) -> Result<String>;
}

/// Renders a PNG QR code and returns it as a `data:` URL.
#[derive(Debug, Clone)]
pub struct QrPngRenderer {
    min_size: u32,
}

impl QrPngRenderer {
    pub fn new(min_size: u32) -> Self {
        Self { min_size }
    }
}

impl Default for QrPngRenderer {
    fn default() -> Self {
        Self::new(264)
    }
}

impl PairingRenderer for QrPngRenderer {
    fn render(&self, code: &str) -> Result<String> {
        let qr = QrCode::new(code.as_bytes()).map_err(Error::render)?;
        let pixels = qr
            .render::<Luma<u8>>()
            .min_dimensions(self.min_size, self.min_size)
            .build();

        let mut png = Vec::new();
        DynamicImage::ImageLuma8(pixels)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(Error::render)?;

        Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn renders_png_data_url() {
        let url = QrPngRenderer::default()
            .render("2@Zm9vYmFy,abc123,def456==")
            .unwrap();
        let encoded = url.strip_prefix("data:image/png;base64,").expect("data url");
        let bytes = STANDARD.decode(encoded).unwrap();
        assert!(bytes.starts_with(PNG_SIGNATURE));
    }

    #[test]
    fn oversized_code_fails() {
        let huge = "x".repeat(8000);
        let err = QrPngRenderer::default().render(&huge).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }
}
