//! Image encoding: rendered page → base64 PNG.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// PNG-encode a page and return it base64 encoded.
pub fn encode_png_base64(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} page → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );
    Ok(b64)
}

/// Wrap a page as provider-agnostic [`ImageData`] at full detail.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    Ok(ImageData::new(encode_png_base64(img)?, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn page() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 12, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn base64_decodes_to_png() {
        let b64 = encode_png_base64(&page()).expect("encode should succeed");
        let bytes = STANDARD.decode(&b64).expect("valid base64");
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    #[test]
    fn image_data_is_png() {
        let data = encode_page(&page()).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        assert!(!data.data.is_empty());
    }
}
