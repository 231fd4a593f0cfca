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
use std::time::Duration;

use crate::time::{now, DateTime};
use crate::utils::Redact;
use crate::Result;

/// AccessToken is a bearer token together with its expiry.
#[derive(Clone)]
pub struct AccessToken {
    /// The raw token, without the `Bearer ` prefix.
    pub token: String,
    /// When the token stops being valid.
    pub expires_on: DateTime,
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &Redact::from(&self.token))
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Check if the token expires within `buffer` from now.
    pub fn expires_within(&self, buffer: Duration) -> bool {
        match chrono::TimeDelta::from_std(buffer) {
            Ok(buffer) => self.expires_on <= now() + buffer,
            Err(_) => true,
        }
    }
}

/// TokenCredential hands out bearer tokens for a set of scopes.
///
/// Implementations are shared by many pipelines and must be safe to call
/// concurrently. Caching lives in [`BearerTokenPolicy`](crate::BearerTokenPolicy),
/// so a credential is free to hit the network on every call.
#[async_trait::async_trait]
pub trait TokenCredential: Debug + Send + Sync + 'static {
    /// Get a token valid for `scopes`.
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_within() {
        let token = AccessToken::new("abc", now() + chrono::TimeDelta::minutes(3));

        assert!(!token.expires_within(Duration::from_secs(60)));
        assert!(token.expires_within(Duration::from_secs(300)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = AccessToken::new("eyJ0eXAiOiJKV1QiLCJhbGciOi", now());

        let output = format!("{token:?}");
        assert!(output.contains("eyJ***iOi"));
        assert!(!output.contains("eyJ0eXAiOiJKV1QiLCJhbGciOi"));
    }
}
