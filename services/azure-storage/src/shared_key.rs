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

use std::collections::BTreeMap;

use async_trait::async_trait;
use http::header;
use http::HeaderName;
use log::debug;

use azpipe_core::time::{format_http_date, now, DateTime};
use azpipe_core::{Next, Policy, Request, Response, Result};

use crate::constants::*;
use crate::SharedKeyCredential;

/// SharedKeyPolicy implements Azure Storage Shared Key Authorization.
///
/// It runs once per attempt, so every retry carries a fresh `x-ms-date`
/// and signature.
///
/// - [Authorize with Shared Key](https://docs.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key)
#[derive(Debug)]
pub struct SharedKeyPolicy {
    credential: SharedKeyCredential,
    time: Option<DateTime>,
}

impl SharedKeyPolicy {
    pub fn new(credential: SharedKeyCredential) -> Self {
        Self {
            credential,
            time: None,
        }
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    #[cfg(test)]
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    fn sign(&self, req: &mut Request) -> Result<()> {
        let now_time = self.time.unwrap_or_else(now);
        req.insert_header(X_MS_DATE, &format_http_date(now_time))?;

        let string_to_sign = string_to_sign(req, self.credential.account_name())?;
        let signature = self.credential.compute_hmac_sha256(&string_to_sign);

        req.insert_sensitive_header(
            header::AUTHORIZATION,
            &format!(
                "SharedKey {}:{}",
                self.credential.account_name(),
                signature
            ),
        )
    }
}

#[async_trait]
impl Policy for SharedKeyPolicy {
    async fn send(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        self.sign(req)?;
        next.run(req).await
    }
}

/// Construct string to sign
///
/// ## Format
///
/// ```text
/// VERB + "\n" +
/// Content-Encoding + "\n" +
/// Content-Language + "\n" +
/// Content-Length + "\n" +
/// Content-MD5 + "\n" +
/// Content-Type + "\n" +
/// Date + "\n" +
/// If-Modified-Since + "\n" +
/// If-Match + "\n" +
/// If-None-Match + "\n" +
/// If-Unmodified-Since + "\n" +
/// Range + "\n" +
/// CanonicalizedHeaders +
/// CanonicalizedResource;
/// ```
///
/// ## Reference
///
/// - [Blob, Queue, and File Services (Shared Key authorization)](https://docs.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key)
fn string_to_sign(req: &Request, account_name: &str) -> Result<String> {
    let mut s = String::with_capacity(256);

    s.push_str(req.method().as_str());
    s.push('\n');

    let content_length = match header_or_default(req, &header::CONTENT_LENGTH)? {
        "0" => String::new(),
        "" if !req.body().is_empty() => req.body().len().to_string(),
        v => v.to_string(),
    };

    let content_md5 = HeaderName::from_static(CONTENT_MD5);
    let lines = [
        header_or_default(req, &header::CONTENT_ENCODING)?,
        header_or_default(req, &header::CONTENT_LANGUAGE)?,
        content_length.as_str(),
        header_or_default(req, &content_md5)?,
        header_or_default(req, &header::CONTENT_TYPE)?,
        header_or_default(req, &header::DATE)?,
        header_or_default(req, &header::IF_MODIFIED_SINCE)?,
        header_or_default(req, &header::IF_MATCH)?,
        header_or_default(req, &header::IF_NONE_MATCH)?,
        header_or_default(req, &header::IF_UNMODIFIED_SINCE)?,
        header_or_default(req, &header::RANGE)?,
    ];
    for line in lines {
        s.push_str(line);
        s.push('\n');
    }

    s.push_str(&canonicalize_header(req)?);
    s.push_str(&canonicalize_resource(req, account_name));

    debug!("string to sign: {}", &s);

    Ok(s)
}

fn header_or_default<'a>(req: &'a Request, key: &HeaderName) -> Result<&'a str> {
    match req.headers().get(key) {
        Some(v) => Ok(v.to_str()?),
        None => Ok(""),
    }
}

/// ## Reference
///
/// - [Constructing the canonicalized headers string](https://docs.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key#constructing-the-canonicalized-headers-string)
fn canonicalize_header(req: &Request) -> Result<String> {
    let mut headers: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for (k, v) in req.headers() {
        if k.as_str().starts_with("x-ms-") {
            headers
                .entry(k.as_str().to_lowercase())
                .or_default()
                .push(v.to_str()?.trim());
        }
    }

    let mut s = String::with_capacity(64);
    for (k, vs) in headers {
        s.push_str(&k);
        s.push(':');
        s.push_str(&vs.join(","));
        s.push('\n');
    }
    Ok(s)
}

/// ## Reference
///
/// - [Constructing the canonicalized resource string](https://docs.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key#constructing-the-canonicalized-resource-string)
fn canonicalize_resource(req: &Request, account_name: &str) -> String {
    let mut s = format!("/{}{}", account_name, req.url().path());

    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in req.url().query_pairs() {
        query
            .entry(k.to_lowercase())
            .or_default()
            .push(v.into_owned());
    }

    for (k, mut vs) in query {
        vs.sort();
        s.push('\n');
        s.push_str(&k);
        s.push(':');
        s.push_str(&vs.join(","));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use azpipe_core::time::parse_rfc3339;
    use azpipe_core::{Context, HttpSend, Pipeline};
    use bytes::Bytes;
    use http::Method;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    const ACCOUNT: &str = "devstoreaccount1";
    const KEY: &str =
        "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

    fn list_request() -> Request {
        let mut req = Request::try_new(
            Method::GET,
            "https://devstoreaccount1.blob.core.windows.net/mycontainer?restype=container&comp=list",
        )
        .unwrap();
        req.insert_header(X_MS_VERSION, "2020-10-02").unwrap();
        req
    }

    #[test]
    fn test_string_to_sign() {
        let mut req = list_request();
        req.insert_header(X_MS_DATE, "Tue, 01 Mar 2022 08:12:34 GMT")
            .unwrap();

        let actual = string_to_sign(&req, ACCOUNT).unwrap();
        let expected = format!(
            "GET\n{}x-ms-date:Tue, 01 Mar 2022 08:12:34 GMT\nx-ms-version:2020-10-02\n/devstoreaccount1/mycontainer\ncomp:list\nrestype:container",
            "\n".repeat(11)
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_content_length_from_body() {
        let mut req = Request::try_new(
            Method::PUT,
            "https://devstoreaccount1.blob.core.windows.net/mycontainer/hello.txt",
        )
        .unwrap();
        req.set_body("hello");

        let actual = string_to_sign(&req, ACCOUNT).unwrap();
        assert!(actual.starts_with("PUT\n\n\n5\n"), "{actual}");
        assert!(actual.ends_with("/devstoreaccount1/mycontainer/hello.txt"));
    }

    #[test]
    fn test_zero_content_length_is_empty() {
        let mut req = list_request();
        req.insert_header("content-length", "0").unwrap();

        let actual = string_to_sign(&req, ACCOUNT).unwrap();
        assert!(actual.starts_with("GET\n\n\n\n"), "{actual}");
    }

    #[test]
    fn test_repeated_query_values() {
        let req = Request::try_new(
            Method::GET,
            "https://devstoreaccount1.blob.core.windows.net/c?Include=snapshots&include=metadata",
        )
        .unwrap();

        assert_eq!(
            canonicalize_resource(&req, ACCOUNT),
            "/devstoreaccount1/c\ninclude:metadata,snapshots"
        );
    }

    #[derive(Debug, Clone, Default)]
    struct Capture {
        requests: Arc<Mutex<Vec<http::Request<Bytes>>>>,
    }

    #[async_trait]
    impl HttpSend for Capture {
        async fn http_send(&self, req: http::Request<Bytes>) -> Result<Response> {
            self.requests.lock().unwrap().push(req);
            Ok(http::Response::builder().status(200).body(Bytes::new())?)
        }
    }

    #[tokio::test]
    async fn test_sign_request() {
        let _ = env_logger::builder().is_test(true).try_init();

        let capture = Capture::default();
        let ctx = Context::new().with_http_send(capture.clone());
        let cred = SharedKeyCredential::new(ACCOUNT, KEY).unwrap();
        let policy = SharedKeyPolicy::new(cred)
            .with_time(parse_rfc3339("2022-03-01T08:12:34Z").unwrap());
        let pipeline = Pipeline::from_policies(ctx, vec![Arc::new(policy)]);

        let mut req = list_request();
        pipeline.send(&mut req).await.unwrap();

        let sent = capture.requests.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].headers()[X_MS_DATE], "Tue, 01 Mar 2022 08:12:34 GMT");
        let auth = &sent[0].headers()[header::AUTHORIZATION];
        assert!(auth.is_sensitive());
        assert_eq!(
            auth,
            "SharedKey devstoreaccount1:zGvUjlc0WmA0fTIanTxhCi+3zcOFZZ1s1KP4iOC7peE="
        );
    }
}
