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

//! azpipe is the entry point for Azure clients built on a policy pipeline.
//!
//! The core types are re-exported at the crate root. Storage and identity
//! support live in [`storage`] and [`identity`] behind features of the same
//! name.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use azpipe::{PipelineOptions, Request, Result};
//! use http::Method;
//!
//! # async fn example() -> Result<()> {
//! let ctx = azpipe::default_context();
//! let credential = Arc::new(azpipe::identity::default_azure_credential(ctx.clone()));
//! let pipeline = azpipe::arm::new_pipeline(credential, ctx, PipelineOptions::default())?;
//!
//! let mut req = Request::try_new(
//!     Method::GET,
//!     "https://management.azure.com/subscriptions?api-version=2022-12-01",
//! )?;
//! let resp = pipeline.send(&mut req).await?;
//! println!("status: {}", resp.status());
//! # Ok(())
//! # }
//! ```

pub use azpipe_core::*;

pub mod arm;

#[cfg(feature = "default-context")]
mod context;
#[cfg(feature = "default-context")]
pub use context::{default_context, default_context_with_client};

#[cfg(feature = "identity")]
pub mod identity {
    pub use azpipe_azure_identity::*;
}

#[cfg(feature = "storage")]
pub mod storage {
    pub use azpipe_azure_storage::*;
}
