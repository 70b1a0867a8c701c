//! HTTP request and response types shared by the builder and transports.
//!
//! # Design
//! `HttpRequest` is the transport-ready product of `ApiCall::generate_request`:
//! method, absolute URL, headers and optional body, all as plain owned data.
//! `TransportResult` is the raw triple a transport session hands back
//! (body bytes, response head, transport error), before the envelope
//! classifies it. Keeping both as plain data lets tests drive the dispatcher
//! with a stub transport and no network.

use std::fmt;

use bytes::Bytes;

use crate::error::ApiError;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const CSRF_COOKIE: &str = "csrftoken";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// First header value named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status line and headers of a response that arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

/// What a transport session reports for one executed request.
#[derive(Debug, Clone, Default)]
pub struct TransportResult {
    pub body: Option<Bytes>,
    pub head: Option<ResponseHead>,
    pub error: Option<ApiError>,
}

impl TransportResult {
    /// A response that arrived with `status` and `body`.
    pub fn response(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            body: Some(body.into()),
            head: Some(ResponseHead {
                status,
                headers: Vec::new(),
            }),
            error: None,
        }
    }

    /// A failure before any response arrived.
    pub fn failed(error: ApiError) -> Self {
        Self {
            body: None,
            head: None,
            error: Some(error),
        }
    }
}
