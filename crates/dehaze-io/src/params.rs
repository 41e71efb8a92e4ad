//! Form-field parsing into a [`DehazeConfig`].
//!
//! Missing fields take the pipeline defaults. The transmission floor is
//! not exposed to uploads and is always [`UPLOAD_T0`].

use std::collections::BTreeMap;
use std::str::FromStr;

use dehaze_pipeline::DehazeConfig;

use crate::error::RequestError;

/// Form field carrying `omega`.
pub const FIELD_OMEGA: &str = "omega";
/// Form field carrying `window_size`.
pub const FIELD_WINDOW_SIZE: &str = "windowSize";
/// Form field carrying `sky_thresh`.
pub const FIELD_SKY_THRESH: &str = "skyThresh";
/// Form field carrying `sky_trans`.
pub const FIELD_SKY_TRANS: &str = "skyTrans";

/// Transmission floor used for every upload.
pub const UPLOAD_T0: f64 = 0.2;

/// Build a config from form fields.
///
/// Only parsing happens here; range checks are left to
/// [`DehazeConfig::validate`].
///
/// # Errors
///
/// Returns [`RequestError::InvalidParameter`] for a field whose value
/// does not parse.
pub fn config_from_form(form: &BTreeMap<String, String>) -> Result<DehazeConfig, RequestError> {
    Ok(DehazeConfig {
        omega: field_or(form, FIELD_OMEGA, DehazeConfig::DEFAULT_OMEGA)?,
        t0: UPLOAD_T0,
        window_size: field_or(form, FIELD_WINDOW_SIZE, DehazeConfig::DEFAULT_WINDOW_SIZE)?,
        sky_thresh: field_or(form, FIELD_SKY_THRESH, DehazeConfig::DEFAULT_SKY_THRESH)?,
        sky_trans: field_or(form, FIELD_SKY_TRANS, DehazeConfig::DEFAULT_SKY_TRANS)?,
    })
}

fn field_or<T: FromStr>(
    form: &BTreeMap<String, String>,
    field: &str,
    default: T,
) -> Result<T, RequestError> {
    form.get(field).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|_| RequestError::InvalidParameter {
                field: field.to_string(),
                value: raw.clone(),
            })
    })
}
