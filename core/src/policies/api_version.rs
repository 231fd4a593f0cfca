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

use http::HeaderName;

use crate::{Next, Policy, Request, Response, Result};

/// Where the api version is written on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiVersionLocation {
    /// A query parameter with this name, `api-version` for management calls.
    QueryParam(String),
    /// A header with this name, such as `x-ms-version` for storage.
    Header(String),
}

impl Default for ApiVersionLocation {
    fn default() -> Self {
        ApiVersionLocation::QueryParam("api-version".to_string())
    }
}

/// Options for [`ApiVersionPolicy`].
#[derive(Debug, Clone, Default)]
pub struct ApiVersionOptions {
    /// Version to send. Empty leaves requests untouched.
    pub version: String,
    pub location: ApiVersionLocation,
}

impl ApiVersionOptions {
    /// Send `version` in the `api-version` query parameter.
    pub fn query(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            location: ApiVersionLocation::default(),
        }
    }

    /// Send `version` in header `name`.
    pub fn header(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            location: ApiVersionLocation::Header(name.into()),
        }
    }
}

/// ApiVersionPolicy overrides the api version of every request.
#[derive(Debug, Clone)]
pub struct ApiVersionPolicy {
    options: ApiVersionOptions,
}

impl ApiVersionPolicy {
    pub fn new(options: ApiVersionOptions) -> Self {
        Self { options }
    }
}

#[async_trait::async_trait]
impl Policy for ApiVersionPolicy {
    async fn send(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        let version = &self.options.version;
        if !version.is_empty() {
            match &self.options.location {
                ApiVersionLocation::QueryParam(name) => req.set_query_param(name, version),
                ApiVersionLocation::Header(name) => {
                    let name = HeaderName::from_bytes(name.as_bytes())?;
                    req.headers_mut().insert(name, version.parse()?);
                }
            }
        }
        next.run(req).await
    }
}
