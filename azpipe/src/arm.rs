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

//! Azure Resource Manager pipelines.

use std::sync::Arc;

use azpipe_core::{
    BearerTokenPolicy, CloudConfiguration, Context, Error, Pipeline, PipelineOptions, Result,
    ServiceConfiguration, ServiceName, TokenCredential,
};
use log::debug;

/// Build a pipeline for resource manager calls.
///
/// Requests are authenticated with tokens from `credential` for the
/// resource manager scope of `options.cloud`. The bearer policy runs after
/// any per-retry policy already present in `options`.
pub fn new_pipeline(
    credential: Arc<dyn TokenCredential>,
    ctx: Context,
    options: PipelineOptions,
) -> Result<Pipeline> {
    let scope = resource_manager(&options.cloud)?.default_scope();
    debug!("resource manager pipeline authenticates for scope {scope}");

    let options =
        options.with_per_retry_policy(Arc::new(BearerTokenPolicy::new(credential, vec![scope])));
    Pipeline::new(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        ctx,
        options,
    )
}

/// Base URL of resource manager in `cloud`.
pub fn endpoint(cloud: &CloudConfiguration) -> Result<&str> {
    Ok(resource_manager(cloud)?.endpoint.as_str())
}

fn resource_manager(cloud: &CloudConfiguration) -> Result<&ServiceConfiguration> {
    cloud.service(ServiceName::ResourceManager).ok_or_else(|| {
        Error::config("cloud configuration has no resource manager service")
    })
}
