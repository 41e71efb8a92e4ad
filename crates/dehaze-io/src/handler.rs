//! Transport-agnostic upload handling.
//!
//! [`process_request`] runs the whole flow a web endpoint needs: size
//! and file checks, form parsing, decoding, dehazing and JPEG encoding.
//! Binding it to an HTTP framework means building a [`DehazeRequest`]
//! from the multipart body and turning the result into a response,
//! using [`RequestError::status`] for failures.

use std::collections::BTreeMap;

use crate::codec::{decode_image, encode_jpeg};
use crate::error::RequestError;
use crate::params::config_from_form;
use crate::upload::{UploadedFile, check_extension, check_size, require_file};

/// Content type of every successful response.
pub const RESPONSE_CONTENT_TYPE: &str = "image/jpeg";

/// Suggested download filename for the result.
pub const RESPONSE_DOWNLOAD_NAME: &str = "dehazed.jpg";

/// A parsed upload form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DehazeRequest {
    /// The `image` file part, if one was sent.
    pub image: Option<UploadedFile>,
    /// Plain form fields by name.
    pub fields: BTreeMap<String, String>,
}

/// A successful result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DehazedResponse {
    /// MIME type of `body`.
    pub content_type: &'static str,
    /// Suggested filename for the download.
    pub download_name: &'static str,
    /// JPEG-encoded dehazed image.
    pub body: Vec<u8>,
}

/// Handle one dehaze upload.
///
/// # Errors
///
/// Returns a [`RequestError`] describing the first check that failed,
/// in this order: size, file presence, filename, form fields, extension,
/// decoding, pipeline, encoding.
pub fn process_request(request: &DehazeRequest) -> Result<DehazedResponse, RequestError> {
    let result = handle(request);
    if let Err(ref err) = result {
        tracing::warn!(status = err.status(), %err, "dehaze request rejected");
    }
    result
}

fn handle(request: &DehazeRequest) -> Result<DehazedResponse, RequestError> {
    if let Some(ref file) = request.image {
        check_size(file.bytes.len())?;
    }
    let file = require_file(request.image.as_ref())?;
    let config = config_from_form(&request.fields)?;
    check_extension(&file.filename)?;

    tracing::info!(
        filename = %file.filename,
        bytes = file.bytes.len(),
        "processing upload"
    );

    let image = decode_image(&file.bytes)?;
    let dehazed = dehaze_pipeline::dehaze(&image, &config)?;
    let body = encode_jpeg(&dehazed)?;

    tracing::debug!(
        width = dehazed.width(),
        height = dehazed.height(),
        jpeg_bytes = body.len(),
        "encoded dehazed image"
    );

    Ok(DehazedResponse {
        content_type: RESPONSE_CONTENT_TYPE,
        download_name: RESPONSE_DOWNLOAD_NAME,
        body,
    })
}
