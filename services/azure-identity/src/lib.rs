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

//! Token credentials for azpipe.
//!
//! Every credential implements [`azpipe_core::TokenCredential`] and plugs
//! into a pipeline through [`azpipe_core::BearerTokenPolicy`]. Failures are
//! reported as [`azpipe_core::ErrorKind::Auth`].
//!
//! - [`StaticTokenCredential`]: a token acquired out of band
//! - [`ClientSecretCredential`]: service principal with a client secret
//! - [`ImdsCredential`]: managed identity on Azure compute
//! - [`EnvironmentCredential`]: service principal from `AZURE_*` variables
//! - [`ChainedTokenCredential`]: first of several sources that works
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use azpipe_azure_identity::default_azure_credential;
//! use azpipe_core::{BearerTokenPolicy, Context, OsEnv, PipelineOptions};
//!
//! let ctx = Context::new().with_env(OsEnv);
//! let credential = Arc::new(default_azure_credential(ctx));
//! let options = PipelineOptions::default().with_per_retry_policy(Arc::new(
//!     BearerTokenPolicy::new(credential, vec!["https://management.core.windows.net/.default".to_string()]),
//! ));
//! ```

mod constants;
mod token;

mod chain;
pub use chain::{default_azure_credential, ChainedTokenCredential};
mod client_secret;
pub use client_secret::ClientSecretCredential;
mod env;
pub use env::EnvironmentCredential;
mod imds;
pub use imds::{ImdsCredential, UserAssignedId};
mod static_credential;
pub use static_credential::StaticTokenCredential;
