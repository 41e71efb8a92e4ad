//! Upload validation: size ceiling, filename and extension checks.

use crate::error::RequestError;

/// Allowed file extensions for image uploads (compared case-insensitively).
///
/// `svg` is accepted here but no raster decoder handles it, so an SVG
/// upload fails later with [`RequestError::Decode`].
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "tiff", "gif", "svg"];

/// Largest accepted upload, in bytes (16 MiB).
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// A file part received from an upload form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Client-supplied filename. May be empty.
    pub filename: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Create a file part.
    #[must_use]
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Check whether a filename has an allowed image extension.
///
/// Only the text after the last `.` counts; a name without a dot has no
/// extension.
#[must_use]
pub fn has_allowed_extension(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        ALLOWED_EXTENSIONS
            .iter()
            .any(|a| a.eq_ignore_ascii_case(ext))
    })
}

/// Reject uploads larger than [`MAX_UPLOAD_BYTES`].
///
/// # Errors
///
/// Returns [`RequestError::TooLarge`] when `size` exceeds the ceiling.
pub const fn check_size(size: usize) -> Result<(), RequestError> {
    if size > MAX_UPLOAD_BYTES {
        Err(RequestError::TooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        })
    } else {
        Ok(())
    }
}

/// Require a file part with a non-empty filename.
///
/// # Errors
///
/// Returns [`RequestError::NoFile`] if `file` is `None` and
/// [`RequestError::NoFilename`] if its filename is empty.
pub fn require_file(file: Option<&UploadedFile>) -> Result<&UploadedFile, RequestError> {
    let file = file.ok_or(RequestError::NoFile)?;
    if file.filename.is_empty() {
        return Err(RequestError::NoFilename);
    }
    Ok(file)
}

/// Require an allowed extension on `filename`.
///
/// # Errors
///
/// Returns [`RequestError::UnsupportedType`] carrying the filename.
pub fn check_extension(filename: &str) -> Result<(), RequestError> {
    if has_allowed_extension(filename) {
        Ok(())
    } else {
        Err(RequestError::UnsupportedType(filename.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("photo.png", true)]
    #[case("photo.JPG", true)]
    #[case("scan.tiff", true)]
    #[case("anim.gif", true)]
    #[case("logo.svg", true)]
    #[case("archive.tar.jpeg", true)]
    #[case("notes.txt", false)]
    #[case("png", false)]
    #[case("photo.", false)]
    #[case("photo.png.exe", false)]
    fn extension_allow_list(#[case] name: &str, #[case] allowed: bool) {
        assert_eq!(has_allowed_extension(name), allowed);
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        assert!(check_size(MAX_UPLOAD_BYTES).is_ok());
        assert!(matches!(
            check_size(MAX_UPLOAD_BYTES + 1),
            Err(RequestError::TooLarge { .. })
        ));
    }

    #[test]
    fn missing_file_and_empty_name_rejected() {
        assert!(matches!(require_file(None), Err(RequestError::NoFile)));
        let unnamed = UploadedFile::new("", vec![1, 2, 3]);
        assert!(matches!(
            require_file(Some(&unnamed)),
            Err(RequestError::NoFilename)
        ));
        let named = UploadedFile::new("a.png", vec![]);
        assert_eq!(require_file(Some(&named)).unwrap().filename, "a.png");
    }

    #[test]
    fn unsupported_extension_names_the_file() {
        let err = check_extension("notes.txt").unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedType(ref n) if n == "notes.txt"));
    }
}
