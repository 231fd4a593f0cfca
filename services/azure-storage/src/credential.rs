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
use std::sync::Arc;

use azpipe_core::hash::{base64_decode, base64_hmac_sha256};
use azpipe_core::utils::Redact;
use azpipe_core::{AnonymousPolicy, BearerTokenPolicy, Policy, Result, TokenCredential};

use crate::constants::STORAGE_SCOPE;
use crate::SharedKeyPolicy;

/// SharedKeyCredential is a storage account name together with one of its
/// access keys.
#[derive(Clone)]
pub struct SharedKeyCredential {
    account_name: String,
    account_key: String,
    decoded_key: Vec<u8>,
}

impl Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account_name", &self.account_name)
            .field("account_key", &Redact::from(&self.account_key))
            .finish()
    }
}

impl SharedKeyCredential {
    /// Create a credential from the account name and its base64 encoded key.
    pub fn new(account_name: impl Into<String>, account_key: &str) -> Result<Self> {
        let decoded_key = base64_decode(account_key)?;
        Ok(Self {
            account_name: account_name.into(),
            account_key: account_key.to_string(),
            decoded_key,
        })
    }

    /// Azure storage account name.
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Sign `string_to_sign` with the account key, base64 encoded.
    pub fn compute_hmac_sha256(&self, string_to_sign: &str) -> String {
        base64_hmac_sha256(&self.decoded_key, string_to_sign.as_bytes())
    }
}

/// StorageCredential picks how requests to a storage account are authorized.
#[derive(Debug, Clone)]
pub enum StorageCredential {
    /// OAuth bearer token for the `https://storage.azure.com` audience.
    BearerToken(Arc<dyn TokenCredential>),
    /// Shared key signing of every request.
    SharedKey(SharedKeyCredential),
    /// No authorization, for public containers or URLs carrying a SAS.
    Anonymous,
}

impl StorageCredential {
    /// Build the per-retry policy authorizing requests with this credential.
    pub fn policy(&self) -> Arc<dyn Policy> {
        match self {
            StorageCredential::BearerToken(cred) => Arc::new(BearerTokenPolicy::new(
                cred.clone(),
                vec![STORAGE_SCOPE.to_string()],
            )),
            StorageCredential::SharedKey(cred) => Arc::new(SharedKeyPolicy::new(cred.clone())),
            StorageCredential::Anonymous => Arc::new(AnonymousPolicy),
        }
    }

    /// Get the shared key credential, if this is one.
    pub fn as_shared_key(&self) -> Option<&SharedKeyCredential> {
        match self {
            StorageCredential::SharedKey(cred) => Some(cred),
            _ => None,
        }
    }
}

impl From<SharedKeyCredential> for StorageCredential {
    fn from(cred: SharedKeyCredential) -> Self {
        StorageCredential::SharedKey(cred)
    }
}

impl From<Arc<dyn TokenCredential>> for StorageCredential {
    fn from(cred: Arc<dyn TokenCredential>) -> Self {
        StorageCredential::BearerToken(cred)
    }
}
