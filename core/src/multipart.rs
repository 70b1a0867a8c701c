//! `multipart/form-data` encoding for file uploads.
//!
//! # Design
//! Each part is written as
//!
//! ```text
//! --{boundary}\r\n
//! content-disposition: form-data; name="{name}"[; filename="{filename}"]\r\n
//! [Content-Type: {content_type}\r\n]\r\n
//! {bytes}\r\n
//! ```
//!
//! and the body ends with `--{boundary}--`.
//!
//! Boundaries are four dashes followed by sixteen random decimal digits. The
//! body is not scanned for the boundary, so a part whose bytes happen to
//! contain the delimiter will corrupt the form. With 10^16 possible tokens
//! this is acceptable for the small uploads this client makes.

use rand::Rng;

const BOUNDARY_DIGITS: usize = 16;

/// One named form field: text or binary data, optionally typed and named
/// as a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadablePart {
    pub data: Vec<u8>,
    pub name: String,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl UploadablePart {
    /// A plain text field.
    pub fn text(name: &str, value: &str) -> Self {
        Self {
            data: value.as_bytes().to_vec(),
            name: name.to_string(),
            content_type: None,
            file_name: None,
        }
    }

    /// A file field with an explicit content type and file name.
    pub fn file(name: &str, file_name: &str, content_type: &str, data: Vec<u8>) -> Self {
        Self {
            data,
            name: name.to_string(),
            content_type: Some(content_type.to_string()),
            file_name: Some(file_name.to_string()),
        }
    }

    /// Append this part, delimited by `boundary`, to `out`.
    pub fn write_field(&self, boundary: &str, out: &mut Vec<u8>) {
        let mut header = format!(
            "--{boundary}\r\ncontent-disposition: form-data; name=\"{}\"",
            self.name
        );
        if let Some(file_name) = &self.file_name {
            header.push_str(&format!("; filename=\"{file_name}\""));
        }
        header.push_str("\r\n");
        if let Some(content_type) = &self.content_type {
            header.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        header.push_str("\r\n");

        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&self.data);
        out.extend_from_slice(b"\r\n");
    }
}

/// Encode `parts` in order, followed by the closing delimiter.
pub fn encode(parts: &[UploadablePart], boundary: &str) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        part.write_field(boundary, &mut body);
    }
    body.extend_from_slice(format!("--{boundary}--").as_bytes());
    body
}

/// A fresh boundary token: `----` followed by 16 random digits.
pub fn generate_boundary() -> String {
    let mut rng = rand::rng();
    let mut boundary = String::from("----");
    for _ in 0..BOUNDARY_DIGITS {
        let digit: u8 = rng.random_range(0..10);
        boundary.push(char::from(b'0' + digit));
    }
    boundary
}

/// The `Content-Type` header value announcing `boundary`.
pub fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}
