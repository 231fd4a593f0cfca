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

//! Retry policy.

use std::time::Duration;

use http::{HeaderMap, StatusCode};
use log::{debug, warn};
use rand::{thread_rng, Rng};

use crate::time::{now, parse_rfc2822};
use crate::{Error, Next, Policy, Request, Response, Result};

const RETRY_AFTER_MS: &str = "retry-after-ms";
const X_MS_RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";

/// Options for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of retries, not counting the first attempt.
    pub max_retries: u32,
    /// Base delay, doubled on each retry.
    pub retry_delay: Duration,
    /// Upper bound for the computed delay.
    pub max_retry_delay: Duration,
    /// Time limit for a single attempt. `None` means no limit.
    pub try_timeout: Option<Duration>,
    /// Response status codes worth retrying.
    pub status_codes: Vec<StatusCode>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(800),
            max_retry_delay: Duration::from_secs(60),
            try_timeout: None,
            status_codes: vec![
                StatusCode::REQUEST_TIMEOUT,
                StatusCode::TOO_MANY_REQUESTS,
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::GATEWAY_TIMEOUT,
            ],
        }
    }
}

impl RetryOptions {
    /// Disable retries entirely.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    pub fn with_try_timeout(mut self, timeout: Duration) -> Self {
        self.try_timeout = Some(timeout);
        self
    }

    pub fn with_status_codes(mut self, status_codes: Vec<StatusCode>) -> Self {
        self.status_codes = status_codes;
        self
    }
}

/// RetryPolicy re-runs the rest of the pipeline on transient failures.
///
/// Every attempt gets a fresh clone of the caller's request, so the
/// policies after this one (authentication, signing) start from the same
/// input each time. The outcome of the last attempt is returned as is.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    options: RetryOptions,
}

impl RetryPolicy {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    /// Delay before retry number `retry`, starting at 1.
    fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        let base = self.options.retry_delay.saturating_mul(1u32 << exp);
        // Jitter between 0.8x and 1.3x.
        let jittered = base.mul_f64(thread_rng().gen_range(0.8..1.3));
        jittered.min(self.options.max_retry_delay)
    }

    async fn attempt(&self, req: &Request, next: Next<'_>) -> Result<Response> {
        let mut try_req = req.clone();
        match self.options.try_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, next.run(&mut try_req)).await {
                Ok(result) => result,
                Err(_) => Err(Error::transport(format!(
                    "attempt timed out after {timeout:?}"
                ))),
            },
            None => next.run(&mut try_req).await,
        }
    }
}

#[async_trait::async_trait]
impl Policy for RetryPolicy {
    async fn send(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        let allowed = req.idempotent().allows_retry(req.method());
        let mut retries = 0;

        loop {
            let result = self.attempt(req, next).await;

            let retry_after = match &result {
                Ok(resp) if self.options.status_codes.contains(&resp.status()) => {
                    retry_after(resp.headers())
                }
                Ok(_) => return result,
                Err(err) if err.is_retryable() => None,
                Err(_) => return result,
            };

            if !allowed || retries >= self.options.max_retries {
                return result;
            }
            retries += 1;

            let delay = retry_after.unwrap_or_else(|| self.backoff(retries));
            match &result {
                Ok(resp) => debug!(
                    "{} {} returned {}, retry {retries}/{} in {delay:?}",
                    req.method(),
                    req.url().path(),
                    resp.status(),
                    self.options.max_retries
                ),
                Err(err) => warn!(
                    "{} {} failed: {err}, retry {retries}/{} in {delay:?}",
                    req.method(),
                    req.url().path(),
                    self.options.max_retries
                ),
            }
            drop(result);

            match req.cancellation() {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            return Err(Error::cancelled("request cancelled while waiting to retry"));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }
    }
}

/// Read the server requested delay from `retry-after-ms`,
/// `x-ms-retry-after-ms` or `Retry-After`.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    for name in [RETRY_AFTER_MS, X_MS_RETRY_AFTER_MS] {
        if let Some(ms) = headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            return Some(Duration::from_millis(ms));
        }
    }

    let value = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = parse_rfc2822(value).ok()?;
    // A date in the past means retry now.
    Some((at - now()).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Context, ErrorKind, HttpSend, Idempotent, Pipeline};
    use bytes::Bytes;
    use http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    /// Replays scripted outcomes, then keeps answering 200.
    #[derive(Debug)]
    struct ScriptedHttpSend {
        script: Mutex<Vec<Result<Response>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedHttpSend {
        fn new(mut script: Vec<Result<Response>>) -> (Self, Arc<AtomicUsize>) {
            script.reverse();
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    script: Mutex::new(script),
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait::async_trait]
    impl HttpSend for ScriptedHttpSend {
        async fn http_send(&self, _req: http::Request<Bytes>) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop();
            next.unwrap_or_else(|| Ok(status(200)))
        }
    }

    fn status(code: u16) -> Response {
        http::Response::builder()
            .status(code)
            .body(Bytes::new())
            .unwrap()
    }

    fn pipeline(http: ScriptedHttpSend, options: RetryOptions) -> Pipeline {
        let ctx = Context::new().with_http_send(http);
        Pipeline::from_policies(ctx, vec![Arc::new(RetryPolicy::new(options))])
    }

    fn get() -> Request {
        Request::try_new(Method::GET, "https://acct.blob.core.windows.net/c/b").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let (http, calls) = ScriptedHttpSend::new(vec![Ok(status(503)), Ok(status(500))]);
        let pl = pipeline(http, RetryOptions::default());

        let resp = pl.send(&mut get()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_returns_last_response() {
        let (http, calls) = ScriptedHttpSend::new(vec![
            Ok(status(503)),
            Ok(status(503)),
            Ok(status(503)),
        ]);
        let pl = pipeline(http, RetryOptions::default().with_max_retries(2));

        let resp = pl.send(&mut get()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_transport_error() {
        let (http, calls) =
            ScriptedHttpSend::new(vec![Err(Error::transport("connection reset by peer"))]);
        let pl = pipeline(http, RetryOptions::default());

        let resp = pl.send(&mut get()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_on_fatal_error() {
        let (http, calls) = ScriptedHttpSend::new(vec![Err(Error::auth("token expired"))]);
        let pl = pipeline(http, RetryOptions::default());

        let err = pl.send(&mut get()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_on_client_error() {
        let (http, calls) = ScriptedHttpSend::new(vec![Ok(status(404))]);
        let pl = pipeline(http, RetryOptions::default());

        let resp = pl.send(&mut get()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_is_not_retried() {
        let (http, calls) = ScriptedHttpSend::new(vec![Ok(status(503))]);
        let pl = pipeline(http, RetryOptions::default());
        let mut req = Request::try_new(Method::POST, "https://management.azure.com/x").unwrap();

        let resp = pl.send(&mut req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_retried_when_marked_idempotent() {
        let (http, calls) = ScriptedHttpSend::new(vec![Ok(status(503))]);
        let pl = pipeline(http, RetryOptions::default());
        let mut req = Request::try_new(Method::POST, "https://management.azure.com/x")
            .unwrap()
            .with_idempotent(Idempotent::Always);

        let resp = pl.send(&mut req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_header() {
        let throttled = http::Response::builder()
            .status(429)
            .header("retry-after", "7")
            .body(Bytes::new())
            .unwrap();
        let (http, _) = ScriptedHttpSend::new(vec![Ok(throttled)]);
        let pl = pipeline(http, RetryOptions::default());

        let start = tokio::time::Instant::now();
        pl.send(&mut get()).await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let (http, calls) = ScriptedHttpSend::new(vec![Ok(status(503))]);
        let pl = pipeline(
            http,
            RetryOptions::default().with_retry_delay(Duration::from_secs(30)),
        );
        let token = CancellationToken::new();
        let mut req = get().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });
        let err = pl.send(&mut req).await.unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert("retry-after", "3".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(3)));

        headers.insert("x-ms-retry-after-ms", "250".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(250)));

        headers.insert("retry-after-ms", "100".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(100)));

        let mut past = HeaderMap::new();
        past.insert(
            "retry-after",
            "Tue, 01 Mar 2022 08:12:34 GMT".parse().unwrap(),
        );
        assert_eq!(retry_after(&past), Some(Duration::ZERO));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(
            RetryOptions::default()
                .with_retry_delay(Duration::from_secs(10))
                .with_max_retry_delay(Duration::from_secs(15)),
        );

        let first = policy.backoff(1);
        assert!(first >= Duration::from_secs(8) && first <= Duration::from_secs(13));
        assert_eq!(policy.backoff(5), Duration::from_secs(15));
    }
}
