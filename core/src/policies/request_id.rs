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
use uuid::Uuid;

use crate::{Next, Policy, Request, Response, Result};

/// Header carrying the client generated request id.
pub const X_MS_CLIENT_REQUEST_ID: HeaderName = HeaderName::from_static("x-ms-client-request-id");

/// RequestIdPolicy stamps every logical call with `x-ms-client-request-id`.
///
/// An id already set by the caller is kept. The policy runs per call, so all
/// retries of one call share the same id.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdPolicy;

#[async_trait::async_trait]
impl Policy for RequestIdPolicy {
    async fn send(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        if !req.headers().contains_key(&X_MS_CLIENT_REQUEST_ID) {
            let id = new_request_id();
            req.headers_mut().insert(X_MS_CLIENT_REQUEST_ID, id.parse()?);
        }
        next.run(req).await
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}
