//! Normalized outcome of one call.
//!
//! Classification, applied in order:
//! 1. no response head at all: `NoResponseFromServer`
//! 2. a head but no body bytes: `NoDataRetrievedFromServer`
//! 3. otherwise the transport's own error, if any, is kept unchanged
//!
//! Rules 1 and 2 replace whatever error the transport reported. The status
//! accessor is independent of validity, so callers can tell "nothing came
//! back" from "a response with an unwanted status".

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::http::{ResponseHead, TransportResult};

#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    body: Option<Bytes>,
    head: Option<ResponseHead>,
    error: Option<ApiError>,
}

impl ResponseEnvelope {
    pub fn new(raw: TransportResult) -> Self {
        let TransportResult { body, head, error } = raw;
        let classified = if head.is_none() {
            Some(ApiError::NoResponseFromServer)
        } else if body.is_none() {
            Some(ApiError::NoDataRetrievedFromServer)
        } else {
            error.clone()
        };

        if let (Some(reported), Some(kept)) = (&error, &classified) {
            if reported != kept {
                warn!(reported = %reported, classified = %kept, "transport error reclassified");
            }
        }

        Self {
            body,
            head,
            error: classified,
        }
    }

    /// An envelope for a call that failed before reaching the network.
    pub fn from_error(error: ApiError) -> Self {
        Self {
            body: None,
            head: None,
            error: Some(error),
        }
    }

    /// True when no error was classified.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }

    /// HTTP status, present whenever a response arrived.
    pub fn status(&self) -> Option<u16> {
        self.head.as_ref().map(|head| head.status)
    }

    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Check the outcome: the classified error, or the head and body.
    pub fn checked(&self) -> Result<(&ResponseHead, &Bytes), ApiError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let head = self.head.as_ref().ok_or(ApiError::NoResponseFromServer)?;
        let body = self.body.as_ref().ok_or(ApiError::NoDataRetrievedFromServer)?;
        Ok((head, body))
    }

    /// The body decoded as UTF-8 text.
    pub fn text(&self) -> Result<String, ApiError> {
        let body = self.body.as_ref().ok_or(ApiError::NoDataRetrievedFromServer)?;
        String::from_utf8(body.to_vec())
            .map_err(|e| ApiError::DataConversionFailed(format!("body is not UTF-8: {e}")))
    }

    /// The body parsed as a flat JSON object.
    pub fn json_object(&self) -> Result<Map<String, Value>, ApiError> {
        let body = self.body.as_ref().ok_or(ApiError::NoDataRetrievedFromServer)?;
        match serde_json::from_slice(body) {
            Ok(Value::Object(object)) => Ok(object),
            _ => Err(ApiError::DataNotValidJson),
        }
    }
}
