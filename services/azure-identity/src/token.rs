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

use chrono::TimeDelta;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use azpipe_core::time::{now, parse_rfc3339, parse_unix_seconds, DateTime};
use azpipe_core::{AccessToken, Context, Error, Result};

/// Send a token request and decode its JSON body.
///
/// Every failure is reported as an auth error.
pub(crate) async fn send_token_request<T: DeserializeOwned>(
    ctx: &Context,
    req: http::Request<bytes::Bytes>,
    source: &str,
) -> Result<T> {
    let resp = ctx
        .http_send(req)
        .await
        .map_err(|e| Error::auth(format!("{source} token request failed")).with_source(e))?;

    let status = resp.status();
    if !status.is_success() {
        let body = String::from_utf8_lossy(resp.body());
        return Err(Error::auth(format!(
            "{source} token request failed with status {status}: {body}"
        )));
    }

    serde_json::from_slice(resp.body())
        .map_err(|e| Error::auth(format!("failed to parse {source} token response")).with_source(e))
}

/// Token response of the Microsoft identity platform.
#[derive(Deserialize)]
pub(crate) struct OAuthTokenResponse {
    pub access_token: String,
    #[serde(deserialize_with = "number_or_string")]
    pub expires_in: i64,
}

impl OAuthTokenResponse {
    pub fn into_access_token(self) -> Result<AccessToken> {
        let expires_on = TimeDelta::try_seconds(self.expires_in)
            .and_then(|d| now().checked_add_signed(d))
            .ok_or_else(|| {
                Error::auth(format!("invalid token expires_in: {}", self.expires_in))
            })?;
        Ok(AccessToken::new(self.access_token, expires_on))
    }
}

/// Token response of managed identity endpoints.
#[derive(Deserialize)]
pub(crate) struct ManagedIdentityTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_on: String,
}

impl ManagedIdentityTokenResponse {
    pub fn into_access_token(self) -> Result<AccessToken> {
        let expires_on = parse_expires_on(&self.expires_on)?;
        Ok(AccessToken::new(self.access_token, expires_on))
    }
}

/// `expires_on` is unix seconds on IMDS and an RFC3339 time on some hosts.
/// A missing value gives the token ten minutes.
fn parse_expires_on(v: &str) -> Result<DateTime> {
    if v.is_empty() {
        return Ok(now() + TimeDelta::minutes(10));
    }
    parse_unix_seconds(v)
        .or_else(|_| parse_rfc3339(v))
        .map_err(|e| Error::auth(format!("invalid token expires_on: {v}")).with_source(e))
}

fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(v) => Ok(v),
        NumberOrString::String(v) => v.parse().map_err(serde::de::Error::custom),
    }
}
