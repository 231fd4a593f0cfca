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

use std::fmt::Debug;
use std::sync::Arc;

use crate::{Context, Error, Request, Response, Result};

/// Policy intercepts a request on its way to the transport and the response
/// on its way back.
///
/// A policy forwards the request by calling [`Next::run`]. Code before that
/// call runs in registration order, code after it runs in reverse order.
/// Returning without calling `next` skips every later policy and the
/// transport.
///
/// ## Example
///
/// ```
/// use async_trait::async_trait;
/// use azpipe_core::{Next, Policy, Request, Response, Result};
///
/// #[derive(Debug)]
/// struct AcceptJson;
///
/// #[async_trait]
/// impl Policy for AcceptJson {
///     async fn send(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
///         req.insert_header("accept", "application/json")?;
///         next.run(req).await
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait Policy: Debug + Send + Sync + 'static {
    /// Handle `req` and return the response produced downstream.
    async fn send(&self, req: &mut Request, next: Next<'_>) -> Result<Response>;
}

/// Next is the remainder of a pipeline after the current policy.
///
/// It only borrows the pipeline, so copying it is free. The retry policy
/// relies on this to run the downstream chain once per attempt.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    ctx: &'a Context,
    policies: &'a [Arc<dyn Policy>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(ctx: &'a Context, policies: &'a [Arc<dyn Policy>]) -> Self {
        Self { ctx, policies }
    }

    /// Get the context the pipeline was built with.
    pub fn context(&self) -> &'a Context {
        self.ctx
    }

    /// Forward `req` to the next policy, or to the transport when no policy
    /// is left.
    pub async fn run(self, req: &mut Request) -> Result<Response> {
        match self.policies.split_first() {
            Some((policy, rest)) => {
                policy
                    .send(
                        req,
                        Next {
                            ctx: self.ctx,
                            policies: rest,
                        },
                    )
                    .await
            }
            None => transport(self.ctx, req).await,
        }
    }
}

impl Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.policies.len())
            .finish()
    }
}

async fn transport(ctx: &Context, req: &Request) -> Result<Response> {
    let http_req = req.to_http()?;

    match req.cancellation() {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::cancelled("request cancelled while in flight")),
                resp = ctx.http_send(http_req) => resp,
            }
        }
        None => ctx.http_send(http_req).await,
    }
}

/// AnonymousPolicy forwards requests untouched.
///
/// Used for public resources and for URLs that already carry a SAS.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousPolicy;

#[async_trait::async_trait]
impl Policy for AnonymousPolicy {
    async fn send(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        next.run(req).await
    }
}
