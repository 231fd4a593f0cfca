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

use azpipe_core::{AccessToken, Error, Result, TokenCredential};

/// StaticTokenCredential hands out one fixed token whatever the scopes.
///
/// Useful for tests and for tokens acquired out of band.
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: AccessToken,
}

impl StaticTokenCredential {
    pub fn new(token: AccessToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _: &[String]) -> Result<AccessToken> {
        if self.token.expires_within(std::time::Duration::ZERO) {
            return Err(Error::auth("static token has expired"));
        }
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azpipe_core::time::now;

    #[tokio::test]
    async fn test_static_token() {
        let cred = StaticTokenCredential::new(AccessToken::new(
            "token",
            now() + chrono::TimeDelta::hours(1),
        ));
        assert_eq!(cred.get_token(&[]).await.unwrap().token, "token");

        let expired = StaticTokenCredential::new(AccessToken::new(
            "token",
            now() - chrono::TimeDelta::hours(1),
        ));
        assert!(expired.get_token(&[]).await.unwrap_err().is_auth_error());
    }
}
