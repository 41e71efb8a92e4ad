//! dehaze-io: I/O around the dehazing pipeline.
//!
//! Validates uploads, parses form parameters, decodes images into
//! pipeline buffers, encodes results as JPEG, and ties these together
//! in a transport-agnostic request handler. All pixel work lives in
//! `dehaze-pipeline`.

pub mod codec;
pub mod error;
pub mod handler;
pub mod params;
pub mod upload;

pub use codec::{decode_image, encode_jpeg};
pub use error::RequestError;
pub use handler::{DehazeRequest, DehazedResponse, process_request};
pub use upload::UploadedFile;
