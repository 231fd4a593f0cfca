//! [`HttpSend`] implementation backed by [`reqwest`].
//!
//! ```no_run
//! use azpipe_core::Context;
//! use azpipe_http_send_reqwest::ReqwestHttpSend;
//! use std::time::Duration;
//!
//! let client = reqwest::Client::builder()
//!     .timeout(Duration::from_secs(30))
//!     .build()
//!     .unwrap();
//! let ctx = Context::new().with_http_send(ReqwestHttpSend::new(client));
//! ```

use async_trait::async_trait;
use azpipe_core::{Error, HttpSend, Result};
use bytes::Bytes;
use http_body_util::BodyExt;
use log::debug;
use reqwest::{Client, Request};

#[derive(Debug, Default)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req).map_err(from_reqwest_error)?;
        let resp: http::Response<_> = self
            .client
            .execute(req)
            .await
            .map_err(from_reqwest_error)?
            .into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(from_reqwest_error)?;
        Ok(http::Response::from_parts(parts, bs))
    }
}

/// Requests that never left the client are not worth retrying, everything
/// else is a transport failure.
fn from_reqwest_error(err: reqwest::Error) -> Error {
    debug!("reqwest error: {err:?}");
    if err.is_builder() {
        Error::validation(format!("invalid request: {err}")).with_source(err)
    } else if err.is_timeout() {
        Error::transport(format!("request timed out: {err}")).with_source(err)
    } else {
        Error::transport(format!("failed to send request: {err}")).with_source(err)
    }
}
