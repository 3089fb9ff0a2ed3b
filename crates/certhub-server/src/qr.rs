//! QR binding: canonical verification URLs, PNG rendering, and upload.
//!
//! A certificate without a resolvable QR image is invalid output, so the
//! upload is a hard dependency of minting, not best-effort.

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageBuffer, Luma};
use qrcode::{EcLevel, QrCode};
use thiserror::Error;

use crate::objectstore::ObjectStore;

/// Pixels per QR module; the quiet zone is exactly one module wide.
const MODULE_PIXELS: u32 = 8;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(String),

    #[error("PNG encoding failed: {0}")]
    Png(String),

    #[error("QR upload failed: {0}")]
    Upload(String),
}

/// The result of binding an identifier to its QR artifacts.
#[derive(Debug, Clone)]
pub struct QrBinding {
    /// Canonical verification URL encoded in the QR image.
    pub verification_url: String,
    /// Stable public URL of the stored PNG.
    pub image_url: String,
}

/// Builds verification URLs and persists rendered QR images.
#[derive(Clone)]
pub struct QrBinder {
    base_verify_url: String,
    store: Arc<dyn ObjectStore>,
}

impl QrBinder {
    pub fn new(base_verify_url: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        let base_verify_url = base_verify_url.into().trim_end_matches('/').to_string();
        Self {
            base_verify_url,
            store,
        }
    }

    /// The canonical verification URL for a certificate identifier.
    pub fn verification_url(&self, certificate_id: &str) -> String {
        format!("{}/verify/{certificate_id}", self.base_verify_url)
    }

    /// Render the verification QR and upload it under `{certificate_id}.png`,
    /// overwriting any existing object (idempotent re-generation).
    pub async fn bind(&self, certificate_id: &str) -> Result<QrBinding, QrError> {
        let verification_url = self.verification_url(certificate_id);
        let png = render_png(&verification_url)?;

        let key = format!("{certificate_id}.png");
        self.store
            .put(&key, &png, "image/png")
            .await
            .map_err(|e| QrError::Upload(e.to_string()))?;

        Ok(QrBinding {
            verification_url,
            image_url: self.store.public_url(&key),
        })
    }
}

/// Render data into a black-on-white PNG at error-correction level M with a
/// one-module quiet zone.
pub fn render_png(data: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::with_error_correction_level(data, EcLevel::M)
        .map_err(|e| QrError::Encode(e.to_string()))?;

    let modules: ImageBuffer<Luma<u8>, Vec<u8>> = code
        .render::<Luma<u8>>()
        .quiet_zone(false)
        .module_dimensions(MODULE_PIXELS, MODULE_PIXELS)
        .build();

    // The renderer's built-in quiet zone is four modules; frame manually to
    // get exactly one.
    let (width, height) = modules.dimensions();
    let mut framed = ImageBuffer::from_pixel(
        width + 2 * MODULE_PIXELS,
        height + 2 * MODULE_PIXELS,
        Luma([255u8]),
    );
    image::imageops::replace(
        &mut framed,
        &modules,
        i64::from(MODULE_PIXELS),
        i64::from(MODULE_PIXELS),
    );

    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(framed)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| QrError::Png(e.to_string()))?;

    Ok(bytes)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::objectstore::MemoryObjectStore;

    #[test]
    fn render_png_produces_png_bytes() {
        let png = render_png("https://certs.example.org/verify/mun24-abc123").unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn verification_url_trims_trailing_slash() {
        let store = Arc::new(MemoryObjectStore::default());
        let binder = QrBinder::new("https://certs.example.org/", store);
        assert_eq!(
            binder.verification_url("mun24-abc123"),
            "https://certs.example.org/verify/mun24-abc123"
        );
    }

    #[tokio::test]
    async fn bind_uploads_under_certificate_key() {
        let store = Arc::new(MemoryObjectStore::default());
        let binder =
            QrBinder::new("https://certs.example.org", Arc::clone(&store) as Arc<dyn ObjectStore>);

        let binding = binder.bind("mun24-abc123").await.unwrap();

        assert_eq!(
            binding.verification_url,
            "https://certs.example.org/verify/mun24-abc123"
        );
        assert_eq!(binding.image_url, "memory://qr-codes/mun24-abc123.png");
        assert!(store.contains("mun24-abc123.png"));

        // Re-binding overwrites idempotently
        binder.bind("mun24-abc123").await.unwrap();
        assert!(store.contains("mun24-abc123.png"));
    }
}
