//! Image decoding and JPEG encoding.

use std::io::Cursor;

use dehaze_pipeline::RasterImage;
use image::ImageEncoder;
use image::codecs::jpeg::JpegEncoder;

use crate::error::RequestError;

/// JPEG quality used for dehazed output.
pub const JPEG_QUALITY: u8 = 95;

/// Decode an uploaded file into an 8-bit color image.
///
/// The format is sniffed from the bytes. Alpha and extra precision are
/// dropped.
///
/// # Errors
///
/// Returns [`RequestError::Decode`] if the bytes are not a supported
/// raster image.
pub fn decode_image(bytes: &[u8]) -> Result<RasterImage, RequestError> {
    let decoded = image::load_from_memory(bytes).map_err(RequestError::Decode)?;
    Ok(RasterImage::from_rgb8(&decoded.to_rgb8()))
}

/// Encode an image as a JPEG at [`JPEG_QUALITY`].
///
/// # Errors
///
/// Returns [`RequestError::Encode`] if encoding fails (for example
/// when a dimension exceeds what JPEG can represent).
pub fn encode_jpeg(image: &RasterImage) -> Result<Vec<u8>, RequestError> {
    let rgb = image.to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(RequestError::Encode)?;
    Ok(buf.into_inner())
}
