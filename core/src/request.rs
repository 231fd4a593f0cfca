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

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{Error, Result};

/// Response returned by a pipeline.
///
/// The body is fully buffered by the transport, dropping the response
/// releases it.
pub type Response = http::Response<Bytes>;

/// Whether the retry policy may send a request more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Idempotent {
    /// Always retry, even for `POST` and `PATCH`.
    Always,
    /// Retry unless the method is `POST` or `PATCH`.
    #[default]
    Default,
    /// Never retry.
    Never,
}

impl Idempotent {
    /// Check if a request with `method` may be retried.
    pub fn allows_retry(self, method: &Method) -> bool {
        match self {
            Idempotent::Always => true,
            Idempotent::Never => false,
            Idempotent::Default => !matches!(*method, Method::POST | Method::PATCH),
        }
    }
}

/// Request is one logical operation flowing through a pipeline.
///
/// The body is kept as [`Bytes`] so every retry attempt can resend it.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
    idempotent: Idempotent,
    cancellation: Option<CancellationToken>,
}

impl Request {
    /// Create a new request with an empty body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            idempotent: Idempotent::Default,
            cancellation: None,
        }
    }

    /// Parse `url` and create a new request.
    pub fn try_new(method: Method, url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        Ok(Self::new(method, url))
    }

    /// Attach a cancellation token observed by every suspension point.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Override the retry behavior of this request.
    pub fn with_idempotent(mut self, idempotent: Idempotent) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn idempotent(&self) -> Idempotent {
        self.idempotent
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Replace the request body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Serialize `value` as the JSON body and set `Content-Type`.
    pub fn set_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let body = serde_json::to_vec(value)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Bytes::from(body);
        Ok(())
    }

    /// Insert a header, replacing any previous values.
    pub fn insert_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Insert a header whose value must never be logged or printed.
    pub fn insert_sensitive_header(&mut self, name: HeaderName, value: &str) -> Result<()> {
        let mut value = HeaderValue::from_str(value)?;
        value.set_sensitive(true);
        self.headers.insert(name, value);
        Ok(())
    }

    /// Get the first value of the query parameter `key`.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Set the query parameter `key`, replacing existing values.
    pub fn set_query_param(&mut self, key: &str, value: &str) {
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut qp = self.url.query_pairs_mut();
        qp.clear();
        qp.extend_pairs(pairs);
        qp.append_pair(key, value);
    }

    /// Build the `http::Request` handed to the transport.
    ///
    /// The body is reference counted so this is cheap to call per attempt.
    pub fn to_http(&self) -> Result<http::Request<Bytes>> {
        let mut req = http::Request::builder()
            .method(self.method.clone())
            .uri(self.url.as_str())
            .body(self.body.clone())?;
        *req.headers_mut() = self.headers.clone();
        Ok(req)
    }
}

impl TryFrom<http::Request<Bytes>> for Request {
    type Error = Error;

    fn try_from(req: http::Request<Bytes>) -> Result<Self> {
        let (parts, body) = req.into_parts();
        let url = Url::parse(&parts.uri.to_string())?;
        let mut out = Request::new(parts.method, url);
        out.headers = parts.headers;
        out.body = body;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(Idempotent::Default, Method::GET, true)]
    #[test_case(Idempotent::Default, Method::PUT, true)]
    #[test_case(Idempotent::Default, Method::DELETE, true)]
    #[test_case(Idempotent::Default, Method::POST, false)]
    #[test_case(Idempotent::Default, Method::PATCH, false)]
    #[test_case(Idempotent::Always, Method::POST, true)]
    #[test_case(Idempotent::Never, Method::GET, false)]
    fn test_allows_retry(idempotent: Idempotent, method: Method, expected: bool) {
        assert_eq!(idempotent.allows_retry(&method), expected);
    }

    #[test]
    fn test_set_query_param_replaces() {
        let mut req = Request::try_new(
            Method::GET,
            "https://management.azure.com/subscriptions?api-version=old&$top=10",
        )
        .unwrap();

        req.set_query_param("api-version", "2021-04-01");

        assert_eq!(req.query_param("api-version").as_deref(), Some("2021-04-01"));
        assert_eq!(req.query_param("$top").as_deref(), Some("10"));
        assert_eq!(
            req.url().query(),
            Some("%24top=10&api-version=2021-04-01")
        );
    }

    #[test]
    fn test_set_json() {
        #[derive(Serialize)]
        struct Body {
            location: &'static str,
        }

        let mut req = Request::try_new(Method::PUT, "https://management.azure.com/rg").unwrap();
        req.set_json(&Body { location: "westus" }).unwrap();

        assert_eq!(req.body().as_ref(), br#"{"location":"westus"}"#);
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_to_http_keeps_parts() {
        let mut req =
            Request::try_new(Method::PUT, "https://acct.blob.core.windows.net/c/b?comp=block")
                .unwrap();
        req.insert_header("x-ms-blob-type", "BlockBlob").unwrap();
        req.set_body("hello");

        let http_req = req.to_http().unwrap();
        assert_eq!(http_req.method(), Method::PUT);
        assert_eq!(
            http_req.uri().to_string(),
            "https://acct.blob.core.windows.net/c/b?comp=block"
        );
        assert_eq!(http_req.headers()["x-ms-blob-type"], "BlockBlob");
        assert_eq!(http_req.body().as_ref(), b"hello");
    }

    #[test]
    fn test_sensitive_header() {
        let mut req = Request::try_new(Method::GET, "https://example.com").unwrap();
        req.insert_sensitive_header(http::header::AUTHORIZATION, "Bearer token")
            .unwrap();

        assert!(req.headers()[http::header::AUTHORIZATION].is_sensitive());
    }
}
