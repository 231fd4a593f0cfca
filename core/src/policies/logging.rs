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

use std::collections::HashSet;
use std::time::Instant;

use http::header::AUTHORIZATION;
use http::HeaderMap;
use log::{debug, info, log_enabled, warn, Level};

use crate::utils::{sanitize_url, REDACTED};
use crate::{Next, Policy, Request, Response, Result};

const DEFAULT_ALLOWED_HEADERS: &[&str] = &[
    "accept",
    "cache-control",
    "content-length",
    "content-type",
    "date",
    "etag",
    "last-modified",
    "retry-after",
    "retry-after-ms",
    "user-agent",
    "x-ms-client-request-id",
    "x-ms-date",
    "x-ms-error-code",
    "x-ms-request-id",
    "x-ms-retry-after-ms",
    "x-ms-version",
];

const DEFAULT_ALLOWED_QUERY_PARAMS: &[&str] = &[
    "api-version",
    "comp",
    "restype",
    "timeout",
    "prefix",
    "marker",
    "maxresults",
    "se",
    "si",
    "sp",
    "spr",
    "sr",
    "srt",
    "ss",
    "st",
    "sv",
];

/// Options for [`LoggingPolicy`].
///
/// Header and query names are matched case-insensitively. Everything not
/// listed is logged as `REDACTED`. `Authorization` is never logged.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub allowed_headers: HashSet<String>,
    pub allowed_query_params: HashSet<String>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            allowed_headers: DEFAULT_ALLOWED_HEADERS
                .iter()
                .map(|v| v.to_string())
                .collect(),
            allowed_query_params: DEFAULT_ALLOWED_QUERY_PARAMS
                .iter()
                .map(|v| v.to_string())
                .collect(),
        }
    }
}

impl LoggingOptions {
    pub fn with_allowed_header(mut self, name: &str) -> Self {
        self.allowed_headers.insert(name.to_lowercase());
        self
    }

    pub fn with_allowed_query_param(mut self, name: &str) -> Self {
        self.allowed_query_params.insert(name.to_lowercase());
        self
    }
}

/// LoggingPolicy logs every attempt that reaches the transport.
#[derive(Debug, Clone, Default)]
pub struct LoggingPolicy {
    options: LoggingOptions,
}

impl LoggingPolicy {
    pub fn new(options: LoggingOptions) -> Self {
        Self { options }
    }

    fn render_headers(&self, headers: &HeaderMap) -> String {
        let mut lines = Vec::with_capacity(headers.len());
        for (name, value) in headers {
            if *name == AUTHORIZATION {
                continue;
            }
            let value = if self.options.allowed_headers.contains(name.as_str())
                && !value.is_sensitive()
            {
                value.to_str().unwrap_or(REDACTED)
            } else {
                REDACTED
            };
            lines.push(format!("{name}: {value}"));
        }
        lines.join(", ")
    }
}

#[async_trait::async_trait]
impl Policy for LoggingPolicy {
    async fn send(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        let url = sanitize_url(req.url(), &self.options.allowed_query_params);
        if log_enabled!(Level::Debug) {
            debug!(
                "==> {} {url} [{}]",
                req.method(),
                self.render_headers(req.headers())
            );
        }

        let method = req.method().clone();
        let start = Instant::now();
        let result = next.run(req).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(resp) => {
                info!("<== {method} {url} {} ({elapsed:?})", resp.status());
                if log_enabled!(Level::Debug) {
                    debug!("<== headers [{}]", self.render_headers(resp.headers()));
                }
            }
            Err(err) => warn!("<== {method} {url} failed after {elapsed:?}: {err}"),
        }
        result
    }
}
