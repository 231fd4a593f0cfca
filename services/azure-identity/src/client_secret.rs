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

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use log::debug;

use azpipe_core::utils::Redact;
use azpipe_core::{AccessToken, CloudConfiguration, Context, Error, Result, TokenCredential};

use crate::token::{send_token_request, OAuthTokenResponse};

/// ClientSecretCredential authenticates a service principal with a client
/// secret.
///
/// Reference: <https://learn.microsoft.com/en-us/entra/identity-platform/v2-oauth2-client-creds-grant-flow>
#[derive(Clone)]
pub struct ClientSecretCredential {
    ctx: Context,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    authority_host: String,
}

impl Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &Redact::from(&self.client_secret))
            .field("authority_host", &self.authority_host)
            .finish()
    }
}

impl ClientSecretCredential {
    /// Create a credential talking to the public cloud authority.
    pub fn new(
        ctx: Context,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority_host: CloudConfiguration::azure_public().authority_host,
        }
    }

    /// Set the authority host, such as `https://login.chinacloudapi.cn/`.
    pub fn with_authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = authority_host.into();
        self
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken> {
        if scopes.is_empty() {
            return Err(Error::config("at least one scope is required"));
        }

        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("scope", &scopes.join(" "))
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret)
            .append_pair("grant_type", "client_credentials")
            .finish();

        let url = self.token_url();
        debug!("requesting client secret token from {url}");
        let req = http::Request::post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(bytes::Bytes::from(body))?;

        let resp: OAuthTokenResponse = send_token_request(&self.ctx, req, "client secret").await?;
        resp.into_access_token()
    }
}
