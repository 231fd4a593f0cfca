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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use azpipe_core::{AccessToken, Context, Error, ErrorKind, Result, TokenCredential};

use crate::{EnvironmentCredential, ImdsCredential};

const NO_SOURCE: usize = usize::MAX;

/// ChainedTokenCredential tries its sources in order and returns the first
/// token obtained.
///
/// The source that succeeded is remembered and asked first from then on.
/// Cancellation is never masked by a later source.
#[derive(Debug)]
pub struct ChainedTokenCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
    selected: AtomicUsize,
}

impl ChainedTokenCredential {
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            selected: AtomicUsize::new(NO_SOURCE),
        }
    }

    /// Append a source to the end of the chain.
    pub fn push(mut self, source: Arc<dyn TokenCredential>) -> Self {
        self.sources.push(source);
        self
    }
}

#[async_trait]
impl TokenCredential for ChainedTokenCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken> {
        let selected = self.selected.load(Ordering::Acquire);
        if let Some(source) = self.sources.get(selected) {
            return source.get_token(scopes).await;
        }

        let mut failures = Vec::with_capacity(self.sources.len());
        for (idx, source) in self.sources.iter().enumerate() {
            match source.get_token(scopes).await {
                Ok(token) => {
                    debug!("token credential chain selected {source:?}");
                    self.selected.store(idx, Ordering::Release);
                    return Ok(token);
                }
                Err(err) if err.kind() == ErrorKind::Cancelled => return Err(err),
                Err(err) => {
                    warn!("token credential {source:?} failed: {err}");
                    failures.push(err.to_string());
                }
            }
        }

        Err(Error::auth(format!(
            "no credential in the chain provided a token: [{}]",
            failures.join("; ")
        )))
    }
}

/// Default credential chain: environment service principal, then managed
/// identity.
pub fn default_azure_credential(ctx: Context) -> ChainedTokenCredential {
    let env: Arc<dyn TokenCredential> = Arc::new(EnvironmentCredential::new(ctx.clone()));
    let imds: Arc<dyn TokenCredential> = Arc::new(ImdsCredential::from_env(ctx));
    ChainedTokenCredential::new(vec![env, imds])
}
