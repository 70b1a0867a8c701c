//! Transport sessions that execute built requests.
//!
//! # Design
//! The dispatcher talks to the network only through `Transport`, which
//! takes an `HttpRequest` and returns the raw (body, head, error) triple.
//! A transport also fronts the cookie store that holds the session and
//! CSRF cookies, because both live in the same HTTP session.
//!
//! `ReqwestTransport` shares one `reqwest::Client` and one cookie jar. Both
//! are reference counted, so clones share the session and can run calls
//! concurrently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Method};
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, ResponseHead, TransportResult};

/// A session capable of executing requests and answering cookie lookups.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request`. Failures are reported inside the result, never
    /// returned as `Err`.
    async fn execute(&self, request: HttpRequest) -> TransportResult;

    /// Value of cookie `name` stored for `site`, if any.
    fn cookie(&self, site: &Url, name: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    jar: Arc<Jar>,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(&config.user_agent)
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self { client, jar })
    }

    /// The cookie jar backing this session.
    pub fn jar(&self) -> &Arc<Jar> {
        &self.jar
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> TransportResult {
        let mut builder = self.client.request(to_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %request.url, error = %e, "request failed before a response");
                return TransportResult::failed(ApiError::Transport(e.to_string()));
            }
        };

        let head = ResponseHead {
            status: response.status().as_u16(),
            headers: response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect(),
        };

        match response.bytes().await {
            Ok(body) => TransportResult {
                body: Some(body),
                head: Some(head),
                error: None,
            },
            Err(e) => TransportResult {
                body: None,
                head: Some(head),
                error: Some(ApiError::Transport(e.to_string())),
            },
        }
    }

    fn cookie(&self, site: &Url, name: &str) -> Option<String> {
        let header = self.jar.cookies(site)?;
        let header = header.to_str().ok()?;
        cookie::Cookie::split_parse(header)
            .filter_map(Result::ok)
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_lookup_reads_named_cookie_from_jar() {
        let transport = ReqwestTransport::new(&ClientConfig::default()).unwrap();
        let site = Url::parse("http://localhost:8000/").unwrap();
        transport.jar().add_cookie_str("sessionid=s3ss10n; Path=/", &site);
        transport.jar().add_cookie_str("csrftoken=t0k3n; Path=/", &site);

        assert_eq!(transport.cookie(&site, "csrftoken").as_deref(), Some("t0k3n"));
        assert_eq!(transport.cookie(&site, "sessionid").as_deref(), Some("s3ss10n"));
        assert_eq!(transport.cookie(&site, "missing"), None);
    }

    #[test]
    fn empty_jar_has_no_cookies() {
        let transport = ReqwestTransport::new(&ClientConfig::default()).unwrap();
        let site = Url::parse("http://localhost:8000/").unwrap();
        assert_eq!(transport.cookie(&site, "csrftoken"), None);
    }
}
