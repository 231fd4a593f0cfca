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

use std::sync::Arc;
use std::time::Duration;

use http::header::AUTHORIZATION;
use log::debug;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{AccessToken, Error, ErrorKind, Next, Policy, Request, Response, Result, TokenCredential};

/// Tokens closer than this to their expiry are refreshed.
const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);

/// BearerTokenPolicy authorizes requests with a token from a [`TokenCredential`].
///
/// The token is cached and reused until it gets within the refresh buffer
/// of its expiry. The cache lock is held while refreshing, so concurrent
/// requests wait for a single `get_token` call and share its result.
///
/// Register it as a per-retry policy so every attempt checks the cache.
#[derive(Debug)]
pub struct BearerTokenPolicy {
    credential: Arc<dyn TokenCredential>,
    scopes: Vec<String>,
    refresh_buffer: Duration,
    cache: Mutex<Option<AccessToken>>,
}

impl BearerTokenPolicy {
    /// Create a policy requesting tokens for `scopes`.
    pub fn new(credential: Arc<dyn TokenCredential>, scopes: Vec<String>) -> Self {
        Self {
            credential,
            scopes,
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
            cache: Mutex::new(None),
        }
    }

    /// Change how long before expiry a token is refreshed.
    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    async fn token(&self, cancel: Option<&CancellationToken>) -> Result<String> {
        let refresh = async {
            let mut cache = self.cache.lock().await;
            if let Some(token) = cache.as_ref() {
                if !token.expires_within(self.refresh_buffer) {
                    return Ok(token.token.clone());
                }
            }

            debug!("refreshing bearer token for scopes {:?}", self.scopes);
            let token = self
                .credential
                .get_token(&self.scopes)
                .await
                .map_err(into_auth_error)?;
            let value = token.token.clone();
            *cache = Some(token);
            Ok(value)
        };

        match cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(Error::cancelled("request cancelled while acquiring token")),
                    token = refresh => token,
                }
            }
            None => refresh.await,
        }
    }
}

fn into_auth_error(err: Error) -> Error {
    match err.kind() {
        ErrorKind::Auth | ErrorKind::Cancelled => err,
        _ => Error::auth(format!("failed to acquire token: {err}")).with_source(err),
    }
}

#[async_trait::async_trait]
impl Policy for BearerTokenPolicy {
    async fn send(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        if req.url().scheme() != "https" {
            return Err(Error::config(
                "bearer token authentication is not permitted for non-TLS protected (non-https) URLs",
            ));
        }

        let token = self.token(req.cancellation()).await?;
        req.insert_sensitive_header(AUTHORIZATION, &format!("Bearer {token}"))?;
        next.run(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;
    use crate::{Context, Pipeline};
    use bytes::Bytes;
    use http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Default)]
    struct CountingCredential {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl TokenCredential for CountingCredential {
        async fn get_token(&self, scopes: &[String]) -> Result<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            // Long enough for concurrent callers to pile up on the lock.
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail {
                return Err(Error::transport("identity endpoint unreachable"));
            }
            assert_eq!(scopes, ["https://management.azure.com/.default".to_string()]);
            Ok(AccessToken::new(
                format!("token-{n}"),
                now() + chrono::TimeDelta::hours(1),
            ))
        }
    }

    #[derive(Debug, Default)]
    struct RecordingHttpSend {
        auth: StdMutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl crate::HttpSend for Arc<RecordingHttpSend> {
        async fn http_send(&self, req: http::Request<Bytes>) -> Result<Response> {
            let value = req.headers()[AUTHORIZATION].to_str().unwrap().to_string();
            self.auth.lock().unwrap().push(value);
            Ok(http::Response::new(Bytes::new()))
        }
    }

    fn scopes() -> Vec<String> {
        vec!["https://management.azure.com/.default".to_string()]
    }

    fn setup(cred: Arc<CountingCredential>) -> (Pipeline, Arc<RecordingHttpSend>) {
        let http = Arc::new(RecordingHttpSend::default());
        let ctx = Context::new().with_http_send(http.clone());
        let policy = BearerTokenPolicy::new(cred, scopes());
        (Pipeline::from_policies(ctx, vec![Arc::new(policy)]), http)
    }

    fn get() -> Request {
        Request::try_new(Method::GET, "https://management.azure.com/subscriptions").unwrap()
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let cred = Arc::new(CountingCredential::default());
        let (pl, http) = setup(cred.clone());

        pl.send(&mut get()).await.unwrap();
        pl.send(&mut get()).await.unwrap();

        assert_eq!(cred.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *http.auth.lock().unwrap(),
            vec!["Bearer token-1".to_string(), "Bearer token-1".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_is_single_flight() {
        let cred = Arc::new(CountingCredential::default());
        let (pl, http) = setup(cred.clone());

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let pl = pl.clone();
            tasks.push(tokio::spawn(async move {
                let mut req = get();
                pl.send(&mut req).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(cred.calls.load(Ordering::SeqCst), 1);
        let auth = http.auth.lock().unwrap();
        assert_eq!(auth.len(), 16);
        assert!(auth.iter().all(|v| v == "Bearer token-1"));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let cred = Arc::new(CountingCredential::default());
        let http = Arc::new(RecordingHttpSend::default());
        let ctx = Context::new().with_http_send(http.clone());
        // Every token is within a two hour buffer, so each call refreshes.
        let policy = BearerTokenPolicy::new(cred.clone(), scopes())
            .with_refresh_buffer(Duration::from_secs(2 * 60 * 60));
        let pl = Pipeline::from_policies(ctx, vec![Arc::new(policy)]);

        pl.send(&mut get()).await.unwrap();
        pl.send(&mut get()).await.unwrap();

        assert_eq!(cred.calls.load(Ordering::SeqCst), 2);
        assert_eq!(http.auth.lock().unwrap()[1], "Bearer token-2");
    }

    #[tokio::test]
    async fn test_failure_is_auth_error() {
        let cred = Arc::new(CountingCredential {
            fail: true,
            ..Default::default()
        });
        let (pl, http) = setup(cred);

        let err = pl.send(&mut get()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(!err.is_retryable());
        assert!(http.auth.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refuses_plain_http() {
        let cred = Arc::new(CountingCredential::default());
        let (pl, _) = setup(cred.clone());
        let mut req = Request::try_new(Method::GET, "http://management.azure.com/").unwrap();

        let err = pl.send(&mut req).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(cred.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_refresh() {
        let cred = Arc::new(CountingCredential::default());
        let (pl, _) = setup(cred);
        let token = CancellationToken::new();
        token.cancel();
        let mut req = get().with_cancellation(token);

        let err = pl.send(&mut req).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
