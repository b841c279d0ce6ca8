//! QR code rendering for the HTTP surface.

use {
    anyhow::Result,
    base64::{Engine as _, engine::general_purpose::STANDARD},
    image::{ImageBuffer, Luma},
    qrcode::{EcLevel, QrCode},
};

use wagate_sessions::client::QrRenderer;

/// Renders QR strings as `data:image/png;base64,...` URLs, ready to drop
/// into an `<img>` tag.
pub struct PngRenderer {
    module_size: u32,
    quiet_zone: u32,
}

impl PngRenderer {
    pub fn new() -> Self {
        Self {
            module_size: 8,
            quiet_zone: 2,
        }
    }
}

impl Default for PngRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl QrRenderer for PngRenderer {
    fn to_image_data(&self, qr: &str) -> Result<String> {
        let code = QrCode::with_error_correction_level(qr.as_bytes(), EcLevel::L)
            .map_err(|e| anyhow::anyhow!("QR generation failed: {e}"))?;

        let modules = code.width() as u32;
        let img_size = (modules + self.quiet_zone * 2) * self.module_size;
        let module_size = self.module_size;
        let quiet_zone = self.quiet_zone;

        let img = ImageBuffer::from_fn(img_size, img_size, |x, y| {
            let mx = (x / module_size).saturating_sub(quiet_zone);
            let my = (y / module_size).saturating_sub(quiet_zone);

            if x / module_size < quiet_zone
                || y / module_size < quiet_zone
                || mx >= modules
                || my >= modules
            {
                Luma([255u8]) // quiet zone
            } else {
                match code[(mx as usize, my as usize)] {
                    qrcode::Color::Dark => Luma([0u8]),
                    qrcode::Color::Light => Luma([255u8]),
                }
            }
        });

        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png)
            .map_err(|e| anyhow::anyhow!("PNG encoding failed: {e}"))?;

        Ok(format!(
            "data:image/png;base64,{}",
            STANDARD.encode(buf.into_inner())
        ))
    }
}
