//! One API call: request construction and asynchronous dispatch.
//!
//! # Design
//! An `ApiCall` owns its outbound request (method, endpoint, optional body,
//! content type) and, once sent, its `ResponseEnvelope`. It moves through
//! `Unsent -> InFlight -> Completed` exactly once.
//!
//! - Errors never escape `send` as `Err`. A request that cannot be built is
//!   recorded as an envelope carrying the build error, and no network
//!   activity happens.
//! - `send_to_server` consumes the call, runs it on a tokio task and hands
//!   the completed call to the callback exactly once, after the envelope is
//!   fully populated. Aborting the task still fires the callback, with a
//!   `Cancelled` envelope.
//! - A `send` future dropped mid-flight leaves the call `InFlight`; the next
//!   `send` resolves it as `Cancelled` without dispatching again.
//! - Body and content type only change together through the `set_*`
//!   methods. `set_files` generates a fresh boundary for each upload.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::envelope::ResponseEnvelope;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, CONTENT_TYPE, CSRF_COOKIE, CSRF_HEADER};
use crate::multipart::{self, UploadablePart};
use crate::resource::{Endpoint, SiteConfig};
use crate::transport::Transport;

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Unsent,
    InFlight,
    Completed,
}

#[derive(Debug)]
pub struct ApiCall {
    site: SiteConfig,
    endpoint: Endpoint,
    method: HttpMethod,
    body: Option<Vec<u8>>,
    content_type: Option<String>,
    state: CallState,
    csrf_sent: bool,
    response: Option<ResponseEnvelope>,
}

impl ApiCall {
    pub fn new(site: &SiteConfig, endpoint: Endpoint, method: HttpMethod) -> Self {
        Self {
            site: site.clone(),
            endpoint,
            method,
            body: None,
            content_type: None,
            state: CallState::Unsent,
            csrf_sent: false,
            response: None,
        }
    }

    /// A call to a path relative to the site root, e.g. `groups/login/`.
    pub fn site(site: &SiteConfig, relative: &str, method: HttpMethod) -> Result<Self, ApiError> {
        Ok(Self::new(site, Endpoint::site(site, relative)?, method))
    }

    /// A call to a path relative to the API root, e.g. `employees/`.
    pub fn api(site: &SiteConfig, relative: &str, method: HttpMethod) -> Result<Self, ApiError> {
        Ok(Self::new(site, Endpoint::api(site, relative)?, method))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Attach raw bytes with an explicit content type.
    pub fn set_body(&mut self, body: Vec<u8>, content_type: &str) {
        self.body = Some(body);
        self.content_type = Some(content_type.to_string());
    }

    /// Attach raw bytes and clear the content type. Building the request
    /// fails with `BadRequest` until `set_body` supplies one.
    pub fn set_raw_body(&mut self, body: Vec<u8>) {
        self.body = Some(body);
        self.content_type = None;
    }

    /// Attach a JSON object body.
    pub fn set_json(&mut self, data: &Map<String, Value>) -> Result<(), ApiError> {
        let body = serde_json::to_vec(data).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        self.set_body(body, JSON_CONTENT_TYPE);
        Ok(())
    }

    /// Attach a URL-encoded form body.
    pub fn set_form(&mut self, fields: &[(&str, &str)]) -> Result<(), ApiError> {
        let body = serde_urlencoded::to_string(fields)
            .map_err(|e| ApiError::SerializationError(e.to_string()))?;
        self.set_body(body.into_bytes(), FORM_CONTENT_TYPE);
        Ok(())
    }

    /// Attach `parts` as a multipart form. An empty list leaves the call
    /// untouched.
    pub fn set_files(&mut self, parts: &[UploadablePart]) {
        if parts.is_empty() {
            return;
        }
        let boundary = multipart::generate_boundary();
        self.set_body(multipart::encode(parts, &boundary), &multipart::content_type(&boundary));
    }

    /// The request body read back as a JSON object, if it is one.
    pub fn api_data(&self) -> Option<Map<String, Value>> {
        match serde_json::from_slice(self.body.as_deref()?) {
            Ok(Value::Object(object)) => Some(object),
            _ => None,
        }
    }

    /// Resolve the call into transport-ready data. `csrf_token` is attached
    /// as `X-CSRFToken` when present.
    pub fn generate_request(&self, csrf_token: Option<&str>) -> Result<HttpRequest, ApiError> {
        if self.body.is_some() && self.content_type.is_none() {
            return Err(ApiError::BadRequest);
        }

        let mut headers = Vec::new();
        if let Some(token) = csrf_token {
            headers.push((CSRF_HEADER.to_string(), token.to_string()));
        }
        if let Some(content_type) = &self.content_type {
            headers.push((CONTENT_TYPE.to_string(), content_type.clone()));
        }

        Ok(HttpRequest {
            method: self.method,
            url: self.endpoint.as_str().to_string(),
            headers,
            body: self.body.clone(),
        })
    }

    /// Run the call and return its envelope. Calling this again on a
    /// completed call returns the stored envelope without touching the
    /// network. A call whose earlier `send` was dropped in flight completes
    /// as `Cancelled`.
    pub async fn send(&mut self, transport: &dyn Transport) -> &ResponseEnvelope {
        if self.state == CallState::Unsent {
            let envelope = self.dispatch(transport).await;
            self.response = Some(envelope);
        }
        self.resolve_cancelled();
        self.response
            .get_or_insert_with(|| ResponseEnvelope::from_error(ApiError::Cancelled))
    }

    /// Move to `Completed`, recording a `Cancelled` envelope if none was
    /// stored.
    fn resolve_cancelled(&mut self) {
        if self.response.is_none() {
            debug!(method = %self.method, url = %self.endpoint, "call cancelled in flight");
            self.response = Some(ResponseEnvelope::from_error(ApiError::Cancelled));
        }
        self.state = CallState::Completed;
    }

    async fn dispatch(&mut self, transport: &dyn Transport) -> ResponseEnvelope {
        let csrf_token = transport.cookie(self.site.site_root(), CSRF_COOKIE);
        let request = match self.generate_request(csrf_token.as_deref()) {
            Ok(request) => request,
            Err(e) => {
                debug!(method = %self.method, url = %self.endpoint, error = %e, "request build failed");
                return ResponseEnvelope::from_error(e);
            }
        };
        self.csrf_sent = csrf_token.is_some();
        self.state = CallState::InFlight;

        debug!(method = %self.method, url = %self.endpoint, "dispatching call");
        let envelope = ResponseEnvelope::new(transport.execute(request).await);
        debug!(
            method = %self.method,
            url = %self.endpoint,
            status = ?envelope.status(),
            valid = envelope.is_valid(),
            "call completed"
        );
        envelope
    }

    /// Run the call on a background task and invoke `callback` with the
    /// completed call exactly once. If the returned handle is aborted first,
    /// the callback still runs, with a `Cancelled` envelope.
    pub fn send_to_server<F>(self, transport: Arc<dyn Transport>, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(ApiCall) + Send + 'static,
    {
        let mut completion = Completion {
            call: Some(self),
            callback: Some(callback),
        };
        tokio::spawn(async move {
            if let Some(call) = completion.call.as_mut() {
                call.send(transport.as_ref()).await;
            }
            completion.finish();
        })
    }

    /// The envelope, once the call has completed.
    pub fn response(&self) -> Option<&ResponseEnvelope> {
        self.response.as_ref()
    }

    /// True when the call completed and its envelope is valid.
    pub fn response_validated(&self) -> bool {
        self.response.as_ref().is_some_and(ResponseEnvelope::is_valid)
    }

    /// Whether an `X-CSRFToken` header went out with the request.
    pub fn csrf_sent(&self) -> bool {
        self.csrf_sent
    }
}

/// Hands the call to its callback when finished or dropped, whichever
/// comes first.
struct Completion<F: FnOnce(ApiCall)> {
    call: Option<ApiCall>,
    callback: Option<F>,
}

impl<F: FnOnce(ApiCall)> Completion<F> {
    fn finish(&mut self) {
        if let (Some(mut call), Some(callback)) = (self.call.take(), self.callback.take()) {
            call.resolve_cancelled();
            callback(call);
        }
    }
}

impl<F: FnOnce(ApiCall)> Drop for Completion<F> {
    fn drop(&mut self) {
        self.finish();
    }
}
