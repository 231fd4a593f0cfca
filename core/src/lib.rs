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

//! Core components of azpipe: the policy pipeline that every Azure call
//! goes through.
//!
//! ## Overview
//!
//! A [`Pipeline`] is an ordered list of [`Policy`] values ending at the
//! [`HttpSend`] transport of a [`Context`]. Policies add headers, sign,
//! retry and log. Credentials plug in as per-retry policies, so a retried
//! attempt is authenticated again.
//!
//! ## Example
//!
//! ```no_run
//! use azpipe_core::{Context, Pipeline, PipelineOptions, Request, Result};
//! use http::{Method, StatusCode};
//!
//! # async fn example(ctx: Context) -> Result<()> {
//! let pipeline = Pipeline::new("example", "0.1.0", ctx, PipelineOptions::default())?;
//!
//! let mut req = Request::try_new(Method::GET, "https://example.blob.core.windows.net/")?;
//! let resp = pipeline.send(&mut req).await?;
//! if !azpipe_core::runtime::has_status_code(&resp, &[StatusCode::OK]) {
//!     return Err(azpipe_core::Error::from_response(resp));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Utilities
//!
//! - [`hash`]: Cryptographic hashing utilities
//! - [`time`]: Time manipulation utilities
//! - [`utils`]: General utilities including data redaction
//! - [`runtime`]: Helpers for clients issuing requests

pub mod hash;
pub mod policies;
pub mod runtime;
pub mod time;
pub mod utils;

mod bearer;
pub use bearer::BearerTokenPolicy;
mod cloud;
pub use cloud::{CloudConfiguration, ServiceConfiguration, ServiceName};
mod context;
pub use context::{Context, Env, HttpSend, NoopEnv, NoopHttpSend, OsEnv, StaticEnv};
mod credential;
pub use credential::{AccessToken, TokenCredential};
mod error;
pub use error::{Error, ErrorKind, Result};
mod pager;
pub use pager::{BoxFuture, Pager, PagingHandler};
mod pipeline;
pub use pipeline::{Pipeline, PipelineOptions};
mod policy;
pub use policy::{AnonymousPolicy, Next, Policy};
mod request;
pub use request::{Idempotent, Request, Response};
mod retry;
pub use retry::{RetryOptions, RetryPolicy};

pub use tokio_util::sync::CancellationToken;
