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

use log::debug;
use percent_encoding::utf8_percent_encode;
use url::Url;

use azpipe_core::policies::ApiVersionOptions;
use azpipe_core::runtime::join_paths;
use azpipe_core::time::DateTime;
use azpipe_core::{Context, Pipeline, PipelineOptions, Result};

use crate::constants::*;
use crate::{BlobUrlParts, Config, Service, StorageCredential};

/// BlobClient addresses one container or blob through a pipeline
/// authorized by a [`StorageCredential`].
///
/// The credential policy is appended to the per-retry policies, so every
/// attempt is signed again.
#[derive(Debug, Clone)]
pub struct BlobClient {
    url: Url,
    credential: StorageCredential,
    pipeline: Pipeline,
}

impl BlobClient {
    pub fn new(
        url: &str,
        credential: StorageCredential,
        ctx: Context,
        mut options: PipelineOptions,
    ) -> Result<Self> {
        let url = Url::parse(url)?;

        options.per_retry_policies.push(credential.policy());
        if options.api_version.is_none() {
            options.api_version = Some(ApiVersionOptions::header(
                X_MS_VERSION,
                DEFAULT_SERVICE_VERSION,
            ));
        }
        let pipeline = Pipeline::new(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            ctx,
            options,
        )?;

        Ok(Self {
            url,
            credential,
            pipeline,
        })
    }

    /// Build a client for `blob` in `container` of the account a
    /// connection string describes.
    pub fn from_connection_string(
        conn_str: &str,
        container: &str,
        blob: &str,
        ctx: Context,
        options: PipelineOptions,
    ) -> Result<Self> {
        let config = Config::try_from_connection_string(conn_str, Service::Blob)?;
        Self::from_config(&config, container, blob, ctx, options)
    }

    pub fn from_config(
        config: &Config,
        container: &str,
        blob: &str,
        ctx: Context,
        options: PipelineOptions,
    ) -> Result<Self> {
        let blob = utf8_percent_encode(blob, &AZURE_PATH_ENCODE_SET).to_string();
        let url = join_paths(&config.endpoint_url()?, &[container, &blob]);
        debug!("blob client for {}", url);

        Self::new(&url, config.credential()?, ctx, options)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn credential(&self) -> &StorageCredential {
        &self.credential
    }

    /// Pipeline requests to this blob are sent through.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// A client for the given snapshot of this blob, or the base blob with
    /// `None`.
    pub fn with_snapshot(&self, snapshot: Option<DateTime>) -> Result<Self> {
        let parts = BlobUrlParts::parse(self.url.as_str())?.with_snapshot(snapshot);
        self.with_url(&parts.to_url())
    }

    /// A client for the given version of this blob, or the current version
    /// with `None`.
    pub fn with_version_id(&self, version_id: Option<&str>) -> Result<Self> {
        let mut parts = BlobUrlParts::parse(self.url.as_str())?;
        parts.version_id = version_id.map(String::from);
        self.with_url(&parts.to_url())
    }

    fn with_url(&self, url: &str) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url)?,
            credential: self.credential.clone(),
            pipeline: self.pipeline.clone(),
        })
    }

    /// Build a URL granting `permissions` on this blob until `expiry`.
    ///
    /// Requires a shared key credential. Any SAS already on the URL is
    /// replaced.
    pub fn sas_url(
        &self,
        permissions: &str,
        start: Option<DateTime>,
        expiry: DateTime,
    ) -> Result<String> {
        let mut parts = BlobUrlParts::parse(self.url.as_str())?;
        let values = parts.sas_values(permissions, start, expiry)?;
        parts.sas = Some(values.sign(&self.credential)?);
        Ok(parts.to_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azpipe_core::time::parse_rfc3339;
    use azpipe_core::ErrorKind;
    use pretty_assertions::assert_eq;

    const CONN_STR: &str = "UseDevelopmentStorage=true";

    #[test]
    fn test_from_connection_string() {
        let client = BlobClient::from_connection_string(
            CONN_STR,
            "mycontainer",
            "dir/my blob.txt",
            Context::new(),
            PipelineOptions::default(),
        )
        .unwrap();

        assert_eq!(
            client.url().as_str(),
            "http://127.0.0.1:10000/devstoreaccount1/mycontainer/dir/my%20blob.txt"
        );
        assert!(client.credential().as_shared_key().is_some());
    }

    #[test]
    fn test_sas_url() {
        let client = BlobClient::from_connection_string(
            CONN_STR,
            "mycontainer",
            "hello.txt",
            Context::new(),
            PipelineOptions::default(),
        )
        .unwrap();

        let url = client
            .sas_url(
                "rw",
                Some(parse_rfc3339("2022-03-01T08:12:34Z").unwrap()),
                parse_rfc3339("2022-03-01T09:12:34Z").unwrap(),
            )
            .unwrap();

        assert_eq!(
            url,
            "http://127.0.0.1:10000/devstoreaccount1/mycontainer/hello.txt?sv=2020-02-10&st=2022-03-01T08%3A12%3A34Z&se=2022-03-01T09%3A12%3A34Z&sr=b&sp=rw&sig=SxbJndYY7aY%2FZx8z4HO4pmC%2F0TBPnI82BY1tim%2BAn3E%3D"
        );
    }

    #[test]
    fn test_snapshot_sas_url() {
        let client = BlobClient::from_connection_string(
            CONN_STR,
            "mycontainer",
            "hello.txt",
            Context::new(),
            PipelineOptions::default(),
        )
        .unwrap()
        .with_snapshot(Some(parse_rfc3339("2022-03-01T08:12:34Z").unwrap()))
        .unwrap();

        let url = client
            .sas_url("r", None, parse_rfc3339("2022-03-01T09:12:34Z").unwrap())
            .unwrap();
        let parts = BlobUrlParts::parse(&url).unwrap();

        assert_eq!(parts.snapshot.as_deref(), Some("2022-03-01T08:12:34.0000000Z"));
        let sas = parts.sas.unwrap();
        assert_eq!(sas.resource(), Some("bs"));
        assert_eq!(sas.signature(), "ii1+UuvUKVTANpKK8ghBR2O3oKRdJYZ94ljt7aoiAp4=");
    }

    #[test]
    fn test_sas_url_requires_shared_key() {
        let client = BlobClient::new(
            "https://account.blob.core.windows.net/c/b",
            StorageCredential::Anonymous,
            Context::new(),
            PipelineOptions::default(),
        )
        .unwrap();

        let err = client
            .sas_url("r", None, parse_rfc3339("2022-03-01T09:12:34Z").unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
