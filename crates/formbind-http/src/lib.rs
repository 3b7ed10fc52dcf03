//! # formbind-http
//!
//! The slice of an HTTP layer that form processing needs: decoding
//! url-encoded and multipart bodies into a [`QueryDict`] plus uploaded files,
//! carried on a minimal [`HttpRequest`].

pub mod querydict;
pub mod request;
pub mod upload;

pub use querydict::QueryDict;
pub use request::{HttpRequest, HttpRequestBuilder};
pub use upload::{MultipartData, UploadedFile};
