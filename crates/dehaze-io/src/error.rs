//! Errors raised while handling a dehaze request.

use dehaze_pipeline::DehazeError;

/// Everything that can go wrong between receiving an upload and
/// returning the encoded result.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The request carried no file part.
    #[error("No file uploaded")]
    NoFile,

    /// A file part was present but its filename was empty.
    #[error("No file selected")]
    NoFilename,

    /// The filename's extension is not on the allow-list.
    #[error("Invalid file type: {0}")]
    UnsupportedType(String),

    /// The upload exceeds the size ceiling.
    #[error("upload of {size} bytes exceeds the {limit}-byte limit")]
    TooLarge {
        /// Size of the rejected upload.
        size: usize,
        /// The ceiling it exceeded.
        limit: usize,
    },

    /// A form field could not be parsed.
    #[error("invalid value {value:?} for form field `{field}`")]
    InvalidParameter {
        /// Form field name.
        field: String,
        /// The raw value received.
        value: String,
    },

    /// The upload could not be decoded as an image.
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The pipeline rejected the parameters or the image.
    #[error(transparent)]
    Config(#[from] DehazeError),

    /// The dehazed image could not be encoded.
    #[error("Error processing image: {0}")]
    Encode(#[source] image::ImageError),
}

impl RequestError {
    /// HTTP status code that best describes this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::NoFile
            | Self::NoFilename
            | Self::UnsupportedType(_)
            | Self::InvalidParameter { .. }
            | Self::Decode(_)
            | Self::Config(_) => 400,
            Self::TooLarge { .. } => 413,
            Self::Encode(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        assert_eq!(RequestError::NoFile.status(), 400);
        assert_eq!(RequestError::NoFilename.status(), 400);
        assert_eq!(RequestError::UnsupportedType("a.txt".into()).status(), 400);
        assert_eq!(
            RequestError::Config(DehazeError::InvalidConfig("omega".into())).status(),
            400
        );
    }

    #[test]
    fn oversize_maps_to_413() {
        let err = RequestError::TooLarge { size: 20, limit: 10 };
        assert_eq!(err.status(), 413);
        assert_eq!(err.to_string(), "upload of 20 bytes exceeds the 10-byte limit");
    }

    #[test]
    fn encode_failure_maps_to_500() {
        let err = RequestError::Encode(image::ImageError::Limits(
            image::error::LimitError::from_kind(image::error::LimitErrorKind::DimensionError),
        ));
        assert_eq!(err.status(), 500);
    }
}
