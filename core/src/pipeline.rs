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

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::policies::{
    ApiVersionOptions, ApiVersionPolicy, LoggingOptions, LoggingPolicy, RequestIdPolicy,
    TelemetryOptions, TelemetryPolicy,
};
use crate::{CloudConfiguration, Context, Next, Policy, Request, Response, Result};
use crate::{RetryOptions, RetryPolicy};

/// Options used to assemble a [`Pipeline`].
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Policies run once per call, before the retry policy.
    pub per_call_policies: Vec<Arc<dyn Policy>>,
    /// Policies run on every attempt, after the retry policy.
    pub per_retry_policies: Vec<Arc<dyn Policy>>,
    pub retry: RetryOptions,
    pub telemetry: TelemetryOptions,
    /// Overrides the api version of every request when set.
    pub api_version: Option<ApiVersionOptions>,
    pub logging: LoggingOptions,
    pub cloud: CloudConfiguration,
}

impl PipelineOptions {
    pub fn with_per_call_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.per_call_policies.push(policy);
        self
    }

    pub fn with_per_retry_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.per_retry_policies.push(policy);
        self
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryOptions) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_api_version(mut self, api_version: ApiVersionOptions) -> Self {
        self.api_version = Some(api_version);
        self
    }

    pub fn with_logging(mut self, logging: LoggingOptions) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_cloud(mut self, cloud: CloudConfiguration) -> Self {
        self.cloud = cloud;
        self
    }
}

/// Pipeline is an ordered chain of policies ending at the transport of a
/// [`Context`].
///
/// The chain is assembled once and shared by every call, cloning a pipeline
/// is cheap.
#[derive(Clone)]
pub struct Pipeline {
    ctx: Context,
    policies: Arc<[Arc<dyn Policy>]>,
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("ctx", &self.ctx)
            .field("policies", &self.policies)
            .finish()
    }
}

impl Pipeline {
    /// Assemble the standard pipeline for `component` at `version`.
    ///
    /// Policies run in this order:
    ///
    /// 1. telemetry (`User-Agent`)
    /// 2. client request id
    /// 3. api version, if configured
    /// 4. `per_call_policies`
    /// 5. retry
    /// 6. `per_retry_policies`, where authentication belongs
    /// 7. logging
    ///
    /// followed by the transport.
    pub fn new(
        component: &str,
        version: &str,
        ctx: Context,
        options: PipelineOptions,
    ) -> Result<Self> {
        let mut policies: Vec<Arc<dyn Policy>> = Vec::with_capacity(
            options.per_call_policies.len() + options.per_retry_policies.len() + 5,
        );

        policies.push(Arc::new(TelemetryPolicy::new(
            component,
            version,
            &options.telemetry,
        )?));
        policies.push(Arc::new(RequestIdPolicy));
        if let Some(api_version) = options.api_version {
            policies.push(Arc::new(ApiVersionPolicy::new(api_version)));
        }
        policies.extend(options.per_call_policies);
        policies.push(Arc::new(RetryPolicy::new(options.retry)));
        policies.extend(options.per_retry_policies);
        policies.push(Arc::new(LoggingPolicy::new(options.logging)));

        Ok(Self::from_policies(ctx, policies))
    }

    /// Build a pipeline out of exactly `policies`, with no built-in policy.
    pub fn from_policies(ctx: Context, policies: Vec<Arc<dyn Policy>>) -> Self {
        Self {
            ctx,
            policies: policies.into(),
        }
    }

    /// Send `req` through every policy and the transport.
    ///
    /// A response is returned for any status code, use
    /// [`has_status_code`](crate::runtime::has_status_code) and
    /// [`Error::from_response`](crate::Error::from_response) to turn
    /// unexpected ones into errors.
    pub async fn send(&self, req: &mut Request) -> Result<Response> {
        Next::new(&self.ctx, &self.policies).run(req).await
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn policies(&self) -> &[Arc<dyn Policy>] {
        &self.policies
    }
}
