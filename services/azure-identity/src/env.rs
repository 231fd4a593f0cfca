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

use async_trait::async_trait;

use azpipe_core::{AccessToken, Context, Error, Result, TokenCredential};

use crate::constants::*;
use crate::ClientSecretCredential;

/// EnvironmentCredential authenticates a service principal described by
/// environment variables.
///
/// - `AZURE_TENANT_ID`
/// - `AZURE_CLIENT_ID`
/// - `AZURE_CLIENT_SECRET`
/// - `AZURE_AUTHORITY_HOST`, optional
#[derive(Debug, Clone)]
pub struct EnvironmentCredential {
    inner: Option<ClientSecretCredential>,
}

impl EnvironmentCredential {
    /// Read the environment of `ctx`.
    ///
    /// Missing variables are not an error here, `get_token` reports them.
    pub fn new(ctx: Context) -> Self {
        let var = |key: &str| ctx.env_var(key).filter(|v| !v.is_empty());

        let inner = match (
            var(AZURE_TENANT_ID),
            var(AZURE_CLIENT_ID),
            var(AZURE_CLIENT_SECRET),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                let authority_host = var(AZURE_AUTHORITY_HOST);
                let mut cred =
                    ClientSecretCredential::new(ctx.clone(), tenant_id, client_id, client_secret);
                if let Some(host) = authority_host {
                    cred = cred.with_authority_host(host);
                }
                Some(cred)
            }
            _ => None,
        };

        Self { inner }
    }

    /// Check if the environment described a service principal.
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken> {
        match &self.inner {
            Some(cred) => cred.get_token(scopes).await,
            None => Err(Error::auth(format!(
                "environment credential is not configured: {AZURE_TENANT_ID}, {AZURE_CLIENT_ID} and {AZURE_CLIENT_SECRET} must be set"
            ))),
        }
    }
}
