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

//! Azure Storage support for azpipe.
//!
//! This crate provides:
//! - Shared Key authorization as a pipeline policy
//! - [`StorageCredential`] to pick between shared key, bearer token and anonymous access
//! - SAS (Shared Access Signature) generation for blobs, containers and accounts
//! - Blob URL parsing and connection strings
//!
//! # Example
//!
//! ```rust,no_run
//! use azpipe_azure_storage::BlobClient;
//! use azpipe_core::time::now;
//! use azpipe_core::{Context, PipelineOptions, Request, Result};
//! use azpipe_http_send_reqwest::ReqwestHttpSend;
//! use http::Method;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ctx = Context::new().with_http_send(ReqwestHttpSend::default());
//!     let client = BlobClient::from_connection_string(
//!         "UseDevelopmentStorage=true",
//!         "mycontainer",
//!         "hello.txt",
//!         ctx,
//!         PipelineOptions::default(),
//!     )?;
//!
//!     // Every attempt is signed with the account key.
//!     let mut req = Request::new(Method::HEAD, client.url().clone());
//!     let resp = client.pipeline().send(&mut req).await?;
//!     println!("Response: {}", resp.status());
//!
//!     // Share read access for an hour.
//!     let url = client.sas_url("r", None, now() + chrono::TimeDelta::hours(1))?;
//!     println!("SAS url: {url}");
//!
//!     Ok(())
//! }
//! ```

mod constants;
pub use constants::{DEFAULT_SERVICE_VERSION, SAS_VERSION, STORAGE_SCOPE};

mod client;
pub use client::BlobClient;
mod config;
pub use config::{Config, Service};
mod connection_string;
mod credential;
pub use credential::{SharedKeyCredential, StorageCredential};
pub mod sas;
pub use sas::{BlobSasSignatureValues, SasQueryParameters};
mod shared_key;
pub use shared_key::SharedKeyPolicy;
mod url_parts;
pub use url_parts::BlobUrlParts;
