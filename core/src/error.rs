//! Error types for the Bizzorg API core.
//!
//! # Design
//! One enum carries every failure the core can report, grouped the way the
//! call pipeline detects them: transport classification (envelope),
//! request construction (builder), content (marshaller), application status
//! (client) and session state (auth). The enum is `Clone` because a copy of
//! the classified error lives inside every `ResponseEnvelope`.
//!
//! The core never auto-classifies a non-2xx status as a failure; only the
//! client operations that expect a specific status turn it into
//! `ServerError`.

use thiserror::Error;

/// Errors surfaced by the request pipeline, the marshaller and the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response object arrived at all.
    #[error("no response from server")]
    NoResponseFromServer,

    /// A response arrived but carried no body bytes.
    #[error("no data retrieved from server")]
    NoDataRetrievedFromServer,

    /// The transport session reported an error alongside a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// A body was attached without a content type.
    #[error("bad request: body present without a content type")]
    BadRequest,

    /// A relative endpoint could not be resolved against the site root.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The body is not JSON, or lacks the `"objects"` array of a listing.
    #[error("data is not valid JSON")]
    DataNotValidJson,

    /// A required field is missing or has the wrong shape.
    #[error("data conversion failed: {0}")]
    DataConversionFailed(String),

    /// A request payload could not be encoded.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The server answered with a status the operation did not expect.
    #[error("server error: HTTP {status}")]
    ServerError { status: u16 },

    #[error("invalid or missing CSRF token")]
    InvalidOrMissingCsrfToken,

    #[error("no logged in user")]
    NoLoggedInUser,

    #[error("user already logged in: {user_uri}")]
    UserAlreadyLoggedIn { user_uri: String },

    /// The call was abandoned while its request was in flight.
    #[error("call cancelled before completion")]
    Cancelled,
}

impl ApiError {
    pub(crate) fn conversion(kind: &str, key: &str) -> Self {
        ApiError::DataConversionFailed(format!("{kind}: missing or malformed `{key}`"))
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::InvalidUrl(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_error_names_kind_and_key() {
        let err = ApiError::conversion("employee", "job_position");
        assert_eq!(
            err.to_string(),
            "data conversion failed: employee: missing or malformed `job_position`"
        );
    }

    #[test]
    fn server_error_displays_status() {
        let err = ApiError::ServerError { status: 500 };
        assert_eq!(err.to_string(), "server error: HTTP 500");
    }
}
