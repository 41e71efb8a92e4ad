//! Request handling from upload to encoded response.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::io::Cursor;

use dehaze_io::upload::MAX_UPLOAD_BYTES;
use dehaze_io::{DehazeRequest, RequestError, UploadedFile, process_request};
use image::ImageFormat;
use rstest::rstest;

fn encoded(format: ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::from_fn(24, 16, |x, y| {
        if y < 6 {
            image::Rgb([225, 228, 236])
        } else {
            image::Rgb([120, u8::try_from(60 + x).unwrap(), 70])
        }
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn request(filename: &str, bytes: Vec<u8>, fields: &[(&str, &str)]) -> DehazeRequest {
    DehazeRequest {
        image: Some(UploadedFile::new(filename, bytes)),
        fields: fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    }
}

#[rstest]
#[case("scene.png", ImageFormat::Png)]
#[case("scene.JPG", ImageFormat::Jpeg)]
#[case("scene.bmp", ImageFormat::Bmp)]
#[case("scene.tiff", ImageFormat::Tiff)]
fn valid_upload_returns_jpeg(#[case] name: &str, #[case] format: ImageFormat) {
    let response = process_request(&request(name, encoded(format), &[])).unwrap();
    assert_eq!(response.content_type, "image/jpeg");
    assert_eq!(response.download_name, "dehazed.jpg");
    let decoded = image::load_from_memory_with_format(&response.body, ImageFormat::Jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (24, 16));
}

#[test]
fn form_parameters_are_applied() {
    let fields = [("omega", "0.95"), ("windowSize", "3"), ("skyTrans", "0.7")];
    let tuned = process_request(&request("a.png", encoded(ImageFormat::Png), &fields)).unwrap();
    let default = process_request(&request("a.png", encoded(ImageFormat::Png), &[])).unwrap();
    assert_ne!(tuned.body, default.body);
}

#[test]
fn missing_file_is_400() {
    let err = process_request(&DehazeRequest::default()).unwrap_err();
    assert!(matches!(err, RequestError::NoFile));
    assert_eq!(err.status(), 400);
}

#[test]
fn empty_filename_is_400() {
    let err = process_request(&request("", encoded(ImageFormat::Png), &[])).unwrap_err();
    assert!(matches!(err, RequestError::NoFilename));
    assert_eq!(err.status(), 400);
}

#[test]
fn disallowed_extension_is_400() {
    let err = process_request(&request("scene.txt", encoded(ImageFormat::Png), &[])).unwrap_err();
    assert!(matches!(err, RequestError::UnsupportedType(_)));
    assert_eq!(err.status(), 400);
}

#[test]
fn svg_passes_allow_list_but_fails_decode() {
    let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="4"/>"#.to_vec();
    let err = process_request(&request("logo.svg", svg, &[])).unwrap_err();
    assert!(matches!(err, RequestError::Decode(_)));
    assert_eq!(err.status(), 400);
}

#[test]
fn oversize_upload_is_413() {
    let err = process_request(&request("big.png", vec![0; MAX_UPLOAD_BYTES + 1], &[])).unwrap_err();
    assert!(matches!(err, RequestError::TooLarge { .. }));
    assert_eq!(err.status(), 413);
}

#[test]
fn unparseable_parameter_is_400() {
    let err =
        process_request(&request("a.png", encoded(ImageFormat::Png), &[("windowSize", "big")]))
            .unwrap_err();
    assert!(matches!(err, RequestError::InvalidParameter { .. }));
    assert_eq!(err.status(), 400);
}

#[rstest]
#[case("omega", "0")]
#[case("windowSize", "4")]
#[case("skyThresh", "1.2")]
#[case("skyTrans", "-0.5")]
fn out_of_range_parameter_is_400(#[case] field: &str, #[case] value: &str) {
    let err = process_request(&request("a.png", encoded(ImageFormat::Png), &[(field, value)]))
        .unwrap_err();
    assert!(matches!(err, RequestError::Config(_)), "unexpected {err:?}");
    assert_eq!(err.status(), 400);
}

#[rstest]
#[case("18446744073709551615")]
#[case("2147483649")]
fn oversized_window_is_processed(#[case] window: &str) {
    let response = process_request(&request(
        "a.png",
        encoded(ImageFormat::Png),
        &[("windowSize", window)],
    ))
    .unwrap();
    assert_eq!(response.content_type, "image/jpeg");
}

#[test]
fn unknown_fields_are_ignored() {
    let mut fields = BTreeMap::new();
    fields.insert("theme".to_string(), "dark".to_string());
    let req = DehazeRequest {
        image: Some(UploadedFile::new("a.png", encoded(ImageFormat::Png))),
        fields,
    };
    assert!(process_request(&req).is_ok());
}
