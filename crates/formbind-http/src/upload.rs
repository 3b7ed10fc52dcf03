//! Multipart form-data decoding.
//!
//! [`parse_multipart`] splits a `multipart/form-data` body into text parts
//! and uploaded files, keyed by the part's `name`. Dotted and indexed names
//! (`docs.0`, `owner.avatar`) are kept verbatim; interpreting them is the
//! forms layer's job.

use std::collections::HashMap;

use formbind_core::{FormError, FormResult};

pub use formbind_core::files::UploadedFile;

/// Default maximum size accepted for a single uploaded file (2.5 MB).
pub const FILE_UPLOAD_MAX_MEMORY_SIZE: usize = 2_621_440;

/// The decoded contents of a multipart body.
#[derive(Debug, Clone, Default)]
pub struct MultipartData {
    /// Text parts: name -> values in submission order.
    pub fields: HashMap<String, Vec<String>>,
    /// File parts: name -> files in submission order.
    pub files: HashMap<String, Vec<UploadedFile>>,
}

/// Extracts the boundary from a `multipart/form-data` content type.
pub fn extract_boundary(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("boundary="))
        .map(|b| b.trim_matches('"'))
        .find(|b| !b.is_empty())
}

/// Parses a `multipart/form-data` body.
///
/// Parts without a `name` are ignored, as are file inputs submitted with
/// neither a filename nor content.
///
/// # Errors
///
/// Returns [`FormError::BadRequest`] if a file exceeds
/// [`FILE_UPLOAD_MAX_MEMORY_SIZE`].
pub fn parse_multipart(body: &[u8], boundary: &str) -> FormResult<MultipartData> {
    let mut data = MultipartData::default();
    let delimiter = format!("--{boundary}");
    let text = String::from_utf8_lossy(body);

    for part in text.split(delimiter.as_str()) {
        let part = part.trim_start_matches("\r\n").trim_start_matches('\n');
        if part.is_empty() || part.starts_with("--") {
            continue;
        }

        let Some((head, content)) = split_head(part) else {
            continue;
        };
        let content = content
            .strip_suffix("\r\n")
            .or_else(|| content.strip_suffix('\n'))
            .unwrap_or(content);

        let part_headers = PartHeaders::parse(head);
        let Some(name) = part_headers.name else {
            continue;
        };

        match part_headers.filename {
            Some(filename) => {
                if filename.is_empty() && content.is_empty() {
                    continue;
                }
                if content.len() > FILE_UPLOAD_MAX_MEMORY_SIZE {
                    return Err(FormError::BadRequest(format!(
                        "File '{filename}' exceeds maximum upload size of \
                         {FILE_UPLOAD_MAX_MEMORY_SIZE} bytes"
                    )));
                }
                let file = UploadedFile::new(
                    filename,
                    part_headers.content_type,
                    content.as_bytes().to_vec(),
                );
                data.files.entry(name).or_default().push(file);
            }
            None => data.fields.entry(name).or_default().push(content.to_string()),
        }
    }

    tracing::trace!(
        fields = data.fields.len(),
        files = data.files.len(),
        "decoded multipart body"
    );
    Ok(data)
}

fn split_head(part: &str) -> Option<(&str, &str)> {
    part.split_once("\r\n\r\n")
        .or_else(|| part.split_once("\n\n"))
}

struct PartHeaders {
    name: Option<String>,
    filename: Option<String>,
    content_type: String,
}

impl PartHeaders {
    fn parse(head: &str) -> Self {
        let mut headers = Self {
            name: None,
            filename: None,
            content_type: "text/plain".to_string(),
        };
        for line in head.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if key.eq_ignore_ascii_case("content-disposition") {
                headers.name = header_param(value, "name");
                headers.filename = header_param(value, "filename");
            } else if key.eq_ignore_ascii_case("content-type") {
                headers.content_type = value.to_string();
            }
        }
        headers
    }
}

/// Extracts `param` from a header value such as
/// `form-data; name="docs.0"; filename="a.txt"`.
fn header_param(header_value: &str, param: &str) -> Option<String> {
    header_value.split(';').skip(1).find_map(|segment| {
        let (key, value) = segment.trim().split_once('=')?;
        (key.trim() == param).then(|| value.trim().trim_matches('"').to_string())
    })
}
