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
use log::debug;

use azpipe_core::utils::Redact;
use azpipe_core::{AccessToken, Context, Error, Result, TokenCredential};

use crate::constants::*;
use crate::token::{send_token_request, ManagedIdentityTokenResponse};

/// Which user assigned identity to request a token for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAssignedId {
    ClientId(String),
    ObjectId(String),
    ResourceId(String),
}

/// ImdsCredential loads tokens from the Azure Instance Metadata Service.
///
/// Available on Azure VMs and other Azure compute resources with a managed
/// identity.
///
/// Reference: <https://learn.microsoft.com/en-us/entra/identity/managed-identities-azure-resources/how-to-use-vm-token#get-a-token-using-http>
#[derive(Clone)]
pub struct ImdsCredential {
    ctx: Context,
    endpoint: String,
    id: Option<UserAssignedId>,
    msi_secret: Option<String>,
}

impl Debug for ImdsCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImdsCredential")
            .field("endpoint", &self.endpoint)
            .field("id", &self.id)
            .field("msi_secret", &Redact::from(&self.msi_secret))
            .finish()
    }
}

impl ImdsCredential {
    /// Create a credential for the system assigned identity.
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            endpoint: IMDS_ENDPOINT.to_string(),
            id: None,
            msi_secret: None,
        }
    }

    /// Create a credential configured from the environment of `ctx`.
    ///
    /// - `AZURE_IMDS_ENDPOINT` overrides the endpoint
    /// - `AZURE_OBJECT_ID`, `AZURE_CLIENT_ID` or `AZURE_MSI_RES_ID` select a user assigned identity, in this order
    /// - `AZURE_MSI_SECRET` is sent as `X-IDENTITY-HEADER`
    pub fn from_env(ctx: Context) -> Self {
        let var = |key: &str| ctx.env_var(key).filter(|v| !v.is_empty());

        let id = var(AZURE_OBJECT_ID)
            .map(UserAssignedId::ObjectId)
            .or_else(|| var(AZURE_CLIENT_ID).map(UserAssignedId::ClientId))
            .or_else(|| var(AZURE_MSI_RES_ID).map(UserAssignedId::ResourceId));
        let endpoint = var(AZURE_IMDS_ENDPOINT).unwrap_or_else(|| IMDS_ENDPOINT.to_string());
        let msi_secret = var(AZURE_MSI_SECRET);

        Self {
            ctx,
            endpoint,
            id,
            msi_secret,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_user_assigned_id(mut self, id: UserAssignedId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_msi_secret(mut self, secret: impl Into<String>) -> Self {
        self.msi_secret = Some(secret.into());
        self
    }

    fn token_url(&self, resource: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("api-version", IMDS_API_VERSION)
            .append_pair("resource", resource);
        if let Some(id) = &self.id {
            let (key, value) = match id {
                UserAssignedId::ClientId(v) => ("client_id", v),
                UserAssignedId::ObjectId(v) => ("object_id", v),
                UserAssignedId::ResourceId(v) => ("msi_res_id", v),
            };
            query.append_pair(key, value);
        }
        format!("{}?{}", self.endpoint, query.finish())
    }
}

/// Managed identity takes a resource, not a scope.
fn scope_to_resource(scopes: &[String]) -> Result<&str> {
    match scopes {
        [scope] => Ok(scope.strip_suffix("/.default").unwrap_or(scope)),
        _ => Err(Error::config(format!(
            "managed identity accepts exactly one scope, got {}",
            scopes.len()
        ))),
    }
}

#[async_trait]
impl TokenCredential for ImdsCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken> {
        let resource = scope_to_resource(scopes)?;
        let url = self.token_url(resource);
        debug!("requesting managed identity token from {}", self.endpoint);

        let mut req = http::Request::get(&url).header("Metadata", "true");
        if let Some(secret) = &self.msi_secret {
            req = req.header("X-IDENTITY-HEADER", secret);
        }
        let req = req.body(bytes::Bytes::new())?;

        let resp: ManagedIdentityTokenResponse =
            send_token_request(&self.ctx, req, "managed identity").await?;
        resp.into_access_token()
    }
}
