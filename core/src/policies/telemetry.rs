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

use http::header::USER_AGENT;
use http::HeaderValue;

use crate::{Error, Next, Policy, Request, Response, Result};

/// Longest application id accepted in the `User-Agent` prefix.
const MAX_APPLICATION_ID_LEN: usize = 24;

/// Options for [`TelemetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct TelemetryOptions {
    /// Prepended to the `User-Agent` header when set.
    pub application_id: Option<String>,
    /// Leave the `User-Agent` header untouched.
    pub disabled: bool,
}

impl TelemetryOptions {
    pub fn with_application_id(mut self, id: impl Into<String>) -> Self {
        self.application_id = Some(id.into());
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// TelemetryPolicy sets `User-Agent` to identify the calling component.
///
/// The value looks like `<app id> azsdk-rust-<component>/<version> (<os>; <arch>)`.
/// A `User-Agent` already on the request is appended after it.
#[derive(Debug, Clone)]
pub struct TelemetryPolicy {
    value: Option<String>,
}

impl TelemetryPolicy {
    /// Create a telemetry policy for `component` at `version`.
    pub fn new(component: &str, version: &str, options: &TelemetryOptions) -> Result<Self> {
        if options.disabled {
            return Ok(Self { value: None });
        }

        let mut value = String::new();
        if let Some(id) = &options.application_id {
            if id.len() > MAX_APPLICATION_ID_LEN || id.contains(' ') {
                return Err(Error::config(format!(
                    "application id must be at most {MAX_APPLICATION_ID_LEN} characters without spaces: {id}"
                )));
            }
            value.push_str(id);
            value.push(' ');
        }
        value.push_str(&format!(
            "azsdk-rust-{component}/{version} ({}; {})",
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
        HeaderValue::from_str(&value)?;

        Ok(Self { value: Some(value) })
    }
}

#[async_trait::async_trait]
impl Policy for TelemetryPolicy {
    async fn send(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        if let Some(value) = &self.value {
            let ua = match req.headers().get(USER_AGENT).and_then(|v| v.to_str().ok()) {
                Some(existing) if !existing.is_empty() => format!("{value} {existing}"),
                _ => value.clone(),
            };
            req.headers_mut().insert(USER_AGENT, HeaderValue::from_str(&ua)?);
        }
        next.run(req).await
    }
}
