// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt;

use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::Response;

/// Header carrying the service error code on storage responses.
const X_MS_ERROR_CODE: &str = "x-ms-error-code";

/// Status codes a service error is considered transient for.
const RETRYABLE_STATUS: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// The error type for azpipe operations
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    retryable: bool,
    status: Option<StatusCode>,
    error_code: Option<String>,
    body: Option<String>,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection or timeout failure while talking to the service.
    Transport,

    /// The service answered with a non-success status code.
    Service,

    /// Credential or token acquisition failed.
    Auth,

    /// Client configuration is invalid or incomplete.
    Config,

    /// Caller supplied malformed input.
    Validation,

    /// The operation was cancelled by the caller.
    Cancelled,

    /// Unexpected errors (I/O, decoding, etc.)
    Unexpected,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind == ErrorKind::Transport,
            status: None,
            error_code: None,
            body: None,
            source: None,
        }
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Override whether the retry policy may retry this error.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether the retry policy is allowed to retry after this error.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// HTTP status of a service error.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Error code reported by the service, if any.
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    /// Raw error body returned by the service, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Check if this error was caused by credentials.
    pub fn is_auth_error(&self) -> bool {
        self.kind == ErrorKind::Auth
            || matches!(self.status, Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN))
    }
}

// Convenience constructors
impl Error {
    /// Create a transport error, retryable by default.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a cancelled error
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    /// Create a service error for the given status.
    pub fn service(status: StatusCode, message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::Service, message);
        err.status = Some(status);
        err.retryable = RETRYABLE_STATUS.contains(&status.as_u16());
        err
    }

    /// Build a service error out of a non-success response.
    ///
    /// The error code is taken from the `x-ms-error-code` header first, then
    /// from a JSON (`{"error": {"code": ...}}`) or XML (`<Error><Code>`) body.
    pub fn from_response(resp: Response) -> Self {
        let (parts, body) = resp.into_parts();
        let body = String::from_utf8_lossy(&body).to_string();

        let mut error_code = parts
            .headers
            .get(X_MS_ERROR_CODE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let mut detail = None;
        if let Some((code, message)) = parse_error_body(&body) {
            if error_code.is_none() {
                error_code = code;
            }
            detail = message;
        }

        let mut message = format!("service responded with {}", parts.status);
        if let Some(code) = &error_code {
            message.push_str(&format!(", error code: {code}"));
        }
        if let Some(detail) = detail {
            message.push_str(&format!(", message: {detail}"));
        }

        let mut err = Self::service(parts.status, message);
        err.error_code = error_code;
        if !body.is_empty() {
            err.body = Some(body);
        }
        err
    }
}

#[derive(Deserialize)]
struct JsonErrorEnvelope {
    error: Option<JsonErrorDetail>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct JsonErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename = "Error")]
struct XmlError {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

fn parse_error_body(body: &str) -> Option<(Option<String>, Option<String>)> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        let v: JsonErrorEnvelope = serde_json::from_str(trimmed).ok()?;
        return Some(match v.error {
            Some(detail) => (detail.code, detail.message),
            None => (v.code, v.message),
        });
    }
    if trimmed.starts_with('<') {
        let v: XmlError = quick_xml::de::from_str(trimmed).ok()?;
        return Some((v.code, v.message.map(|m| m.lines().next().unwrap_or("").to_string())));
    }
    None
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport error"),
            ErrorKind::Service => write!(f, "service error"),
            ErrorKind::Auth => write!(f, "authentication error"),
            ErrorKind::Config => write!(f, "invalid configuration"),
            ErrorKind::Validation => write!(f, "invalid input"),
            ErrorKind::Cancelled => write!(f, "operation cancelled"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::validation(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::validation(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::validation(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::validation(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::validation(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}
