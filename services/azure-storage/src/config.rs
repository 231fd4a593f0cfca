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

use azpipe_core::utils::Redact;
use azpipe_core::{Context, Error, Result};

use crate::{connection_string, SharedKeyCredential, StorageCredential};

const AZBLOB_ENDPOINT: &str = "AZBLOB_ENDPOINT";
const AZBLOB_ACCOUNT_KEY: &str = "AZBLOB_ACCOUNT_KEY";
const AZBLOB_ACCOUNT_NAME: &str = "AZBLOB_ACCOUNT_NAME";
const AZBLOB_SAS_TOKEN: &str = "AZBLOB_SAS_TOKEN";

/// Storage services addressable through a connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Blob,
    File,
    Queue,
    Table,
    /// Data Lake Storage Gen2.
    Adls,
}

impl Service {
    /// Host label of the service, as in `<account>.<label>.core.windows.net`.
    pub fn endpoint_name(&self) -> &'static str {
        match self {
            Service::Blob => "blob",
            Service::File => "file",
            Service::Queue => "queue",
            Service::Table => "table",
            Service::Adls => "dfs",
        }
    }

    pub(crate) fn endpoint_key(&self) -> Option<&'static str> {
        match self {
            Service::Blob => Some("BlobEndpoint"),
            Service::File => Some("FileEndpoint"),
            Service::Queue => Some("QueueEndpoint"),
            Service::Table => Some("TableEndpoint"),
            // ADLS doesn't have a dedicated endpoint key
            Service::Adls => None,
        }
    }
}

/// Config carries all the configuration for Azure Storage services.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// `account_name` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: `AZBLOB_ACCOUNT_NAME`
    pub account_name: Option<String>,
    /// `account_key` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: `AZBLOB_ACCOUNT_KEY`
    pub account_key: Option<String>,
    /// `sas_token` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: `AZBLOB_SAS_TOKEN`
    pub sas_token: Option<String>,
    /// `endpoint` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: `AZBLOB_ENDPOINT`
    pub endpoint: Option<String>,
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("account_name", &self.account_name)
            .field("account_key", &Redact::from(&self.account_key))
            .field("sas_token", &Redact::from(&self.sas_token))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Config {
    /// Load unset fields from the environment of `ctx`.
    ///
    /// Note that the values looked at by this method are specific to Azure
    /// Blob Storage.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        let load = |field: &mut Option<String>, key: &str| {
            if field.is_none() {
                *field = ctx.env_var(key);
            }
        };

        load(&mut self.account_name, AZBLOB_ACCOUNT_NAME);
        load(&mut self.account_key, AZBLOB_ACCOUNT_KEY);
        load(&mut self.sas_token, AZBLOB_SAS_TOKEN);
        load(&mut self.endpoint, AZBLOB_ENDPOINT);

        self
    }

    /// Parses an [Azure connection string][1] into a configuration object.
    ///
    /// The connection string doesn't have to specify all required parameters
    /// because the user is still allowed to set them later directly on the object.
    ///
    /// The function takes a Service parameter because it determines the fields used
    /// to parse the endpoint.
    ///
    /// An example of a connection string looks like:
    ///
    /// ```txt
    /// AccountName=mystorageaccount;
    /// AccountKey=Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==;
    /// BlobEndpoint=https://mystorageaccount.blob.core.windows.net
    /// ```
    ///
    /// [1]: https://learn.microsoft.com/en-us/azure/storage/common/storage-configure-connection-string
    pub fn try_from_connection_string(conn_str: &str, service: Service) -> Result<Self> {
        connection_string::parse(conn_str, service)
    }

    /// Pick the credential this config describes.
    ///
    /// An account key yields a shared key credential. A SAS token travels in
    /// the URL instead, see [`Config::endpoint_url`], so it yields
    /// [`StorageCredential::Anonymous`], as does a config without secrets.
    pub fn credential(&self) -> Result<StorageCredential> {
        if self.sas_token.is_some() {
            return Ok(StorageCredential::Anonymous);
        }

        match (&self.account_name, &self.account_key) {
            (Some(name), Some(key)) => Ok(SharedKeyCredential::new(name, key)?.into()),
            (None, Some(_)) => Err(Error::config("account key is set without account name")),
            _ => Ok(StorageCredential::Anonymous),
        }
    }

    /// Endpoint with the SAS token, if any, appended to its query.
    pub fn endpoint_url(&self) -> Result<String> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::config("storage endpoint is not configured"))?;

        match self.sas_token.as_deref() {
            Some(token) => {
                let token = token.trim_start_matches('?');
                let sep = if endpoint.contains('?') { '&' } else { '?' };
                Ok(format!("{endpoint}{sep}{token}"))
            }
            None => Ok(endpoint.to_string()),
        }
    }
}
