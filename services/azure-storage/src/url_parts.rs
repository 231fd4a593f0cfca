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

use std::net::IpAddr;

use percent_encoding::utf8_percent_encode;
use url::{Host, Url};

use azpipe_core::time::{format_snapshot, parse_rfc3339, DateTime};
use azpipe_core::{Error, Result};

use crate::constants::AZURE_PATH_ENCODE_SET;
use crate::sas::{is_sas_query_name, SasQueryParameters};
use crate::BlobSasSignatureValues;

const SNAPSHOT: &str = "snapshot";
const VERSION_ID: &str = "versionid";

/// BlobUrlParts splits a blob URL into its components.
///
/// Both `https://<account>.blob.core.windows.net/<container>/<blob>` and
/// IP style URLs as served by Azurite,
/// `http://127.0.0.1:10000/<account>/<container>/<blob>`, are understood.
/// [`BlobUrlParts::to_url`] reassembles them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobUrlParts {
    pub scheme: String,
    /// Host including the port if any.
    pub host: String,
    /// Account name taken from the path of an IP style URL.
    pub ip_account_name: Option<String>,
    pub container_name: String,
    pub blob_name: String,
    pub snapshot: Option<String>,
    pub version_id: Option<String>,
    pub sas: Option<SasQueryParameters>,
    /// Query parameters that are neither SAS, snapshot nor version id, still
    /// encoded.
    pub unparsed_params: String,
}

impl BlobUrlParts {
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(Error::validation(format!("blob url has no host: {url}"))),
        };

        let path = percent_encoding::percent_decode_str(url.path())
            .decode_utf8_lossy()
            .into_owned();
        let mut path = path.strip_prefix('/').unwrap_or(&path);

        let mut ip_account_name = None;
        if is_ip_endpoint_style(&url) {
            let (account, rest) = path.split_once('/').unwrap_or((path, ""));
            ip_account_name = Some(account.to_string());
            path = rest;
        }

        let (container_name, blob_name) = path.split_once('/').unwrap_or((path, ""));

        let mut snapshot = None;
        let mut version_id = None;
        let mut sas_pairs = form_urlencoded::Serializer::new(String::new());
        let mut unparsed = form_urlencoded::Serializer::new(String::new());
        let mut has_sas = false;
        for (k, v) in url.query_pairs() {
            if k.eq_ignore_ascii_case(SNAPSHOT) {
                snapshot = Some(v.into_owned());
            } else if k.eq_ignore_ascii_case(VERSION_ID) {
                version_id = Some(v.into_owned());
            } else if is_sas_query_name(&k) {
                has_sas = true;
                sas_pairs.append_pair(&k, &v);
            } else {
                unparsed.append_pair(&k, &v);
            }
        }

        let sas = if has_sas {
            Some(SasQueryParameters::parse(&sas_pairs.finish())?)
        } else {
            None
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            ip_account_name,
            container_name: container_name.to_string(),
            blob_name: blob_name.to_string(),
            snapshot,
            version_id,
            sas,
            unparsed_params: unparsed.finish(),
        })
    }

    /// Rebuild the URL.
    pub fn to_url(&self) -> String {
        let mut path = String::new();
        if let Some(account) = &self.ip_account_name {
            path.push('/');
            path.push_str(account);
        }
        if !self.container_name.is_empty() {
            path.push('/');
            path.push_str(&self.container_name);
            if !self.blob_name.is_empty() {
                path.push('/');
                path.extend(utf8_percent_encode(&self.blob_name, &AZURE_PATH_ENCODE_SET));
            }
        }

        let mut query = self.unparsed_params.clone();
        let mut append = |s: &str| {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(s);
        };
        if let Some(snapshot) = &self.snapshot {
            append(&format!("{SNAPSHOT}={}", urlencoded(snapshot)));
        }
        if let Some(version_id) = &self.version_id {
            append(&format!("{VERSION_ID}={}", urlencoded(version_id)));
        }
        if let Some(sas) = &self.sas {
            append(&sas.encode());
        }

        let mut url = format!("{}://{}{}", self.scheme, self.host, path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    /// Account name, from the path for IP style URLs or the first label of
    /// the host otherwise.
    pub fn account_name(&self) -> Option<&str> {
        match &self.ip_account_name {
            Some(v) => Some(v),
            None => self.host.split('.').next().filter(|v| !v.is_empty()),
        }
    }

    /// Snapshot this URL addresses, if any.
    pub fn snapshot_time(&self) -> Result<Option<DateTime>> {
        self.snapshot.as_deref().map(parse_rfc3339).transpose()
    }

    /// Signature values granting `permissions` on the container or blob this
    /// URL points at, including its snapshot or version.
    pub fn sas_values(
        &self,
        permissions: &str,
        start: Option<DateTime>,
        expiry: DateTime,
    ) -> Result<BlobSasSignatureValues> {
        Ok(BlobSasSignatureValues {
            start_time: start,
            expiry_time: Some(expiry),
            permissions: permissions.to_string(),
            container_name: self.container_name.clone(),
            blob_name: Some(self.blob_name.clone()).filter(|v| !v.is_empty()),
            snapshot_time: self.snapshot_time()?,
            version_id: self.version_id.clone(),
            ..Default::default()
        })
    }

    /// Address the given snapshot, or the base blob with `None`.
    pub fn with_snapshot(mut self, snapshot: Option<DateTime>) -> Self {
        self.snapshot = snapshot.map(format_snapshot);
        self
    }
}

fn is_ip_endpoint_style(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        Some(Host::Domain(d)) => d.parse::<IpAddr>().is_ok(),
        None => false,
    }
}

fn urlencoded(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_parse_standard() {
        let parts = BlobUrlParts::parse(
            "https://myaccount.blob.core.windows.net/mycontainer/dir/my%20blob.txt?snapshot=2022-03-01T08%3A12%3A34.1234567Z&comp=metadata&sv=2020-02-10&sr=bs&sp=r&se=2022-03-01T09%3A12%3A34Z&sig=abc%3D",
        )
        .unwrap();

        assert_eq!(parts.scheme, "https");
        assert_eq!(parts.host, "myaccount.blob.core.windows.net");
        assert_eq!(parts.ip_account_name, None);
        assert_eq!(parts.account_name(), Some("myaccount"));
        assert_eq!(parts.container_name, "mycontainer");
        assert_eq!(parts.blob_name, "dir/my blob.txt");
        assert_eq!(parts.snapshot.as_deref(), Some("2022-03-01T08:12:34.1234567Z"));
        assert_eq!(parts.unparsed_params, "comp=metadata");

        let sas = parts.sas.as_ref().unwrap();
        assert_eq!(sas.resource(), Some("bs"));
        assert_eq!(sas.signature(), "abc=");

        assert_eq!(
            parts.to_url(),
            "https://myaccount.blob.core.windows.net/mycontainer/dir/my%20blob.txt?comp=metadata&snapshot=2022-03-01T08%3A12%3A34.1234567Z&sv=2020-02-10&se=2022-03-01T09%3A12%3A34Z&sr=bs&sp=r&sig=abc%3D"
        );
    }

    #[test]
    fn test_parse_ip_style() {
        let parts =
            BlobUrlParts::parse("http://127.0.0.1:10000/devstoreaccount1/mycontainer/hello.txt")
                .unwrap();

        assert_eq!(parts.host, "127.0.0.1:10000");
        assert_eq!(parts.ip_account_name.as_deref(), Some("devstoreaccount1"));
        assert_eq!(parts.account_name(), Some("devstoreaccount1"));
        assert_eq!(parts.container_name, "mycontainer");
        assert_eq!(parts.blob_name, "hello.txt");
        assert_eq!(parts.sas, None);
        assert_eq!(
            parts.to_url(),
            "http://127.0.0.1:10000/devstoreaccount1/mycontainer/hello.txt"
        );
    }

    #[test_case("https://myaccount.blob.core.windows.net/"; "service")]
    #[test_case("https://myaccount.blob.core.windows.net/mycontainer"; "container")]
    #[test_case("https://myaccount.blob.core.windows.net/mycontainer/a/b/c.txt"; "nested blob")]
    #[test_case("https://myaccount.blob.core.windows.net/mycontainer/b.txt?versionid=2022-03-01T08%3A00%3A00.0000000Z"; "version")]
    #[test_case("http://[::1]:10000/devstoreaccount1/mycontainer/b.txt"; "ipv6")]
    fn test_round_trip(url: &str) {
        let parts = BlobUrlParts::parse(url).unwrap();
        let expected = if url.ends_with('/') {
            url.trim_end_matches('/')
        } else {
            url
        };
        assert_eq!(parts.to_url(), expected);
    }

    #[test]
    fn test_sas_values() {
        let parts = BlobUrlParts::parse(
            "https://myaccount.blob.core.windows.net/mycontainer/hello.txt?snapshot=2022-03-01T08%3A12%3A34.0000000Z",
        )
        .unwrap();
        let expiry = parse_rfc3339("2022-03-01T09:12:34Z").unwrap();

        let values = parts.sas_values("r", None, expiry).unwrap();
        assert_eq!(values.container_name, "mycontainer");
        assert_eq!(values.blob_name.as_deref(), Some("hello.txt"));
        assert_eq!(
            values.snapshot_time,
            Some(parse_rfc3339("2022-03-01T08:12:34Z").unwrap())
        );
        assert_eq!(values.expiry_time, Some(expiry));
    }

    #[test]
    fn test_invalid_snapshot() {
        let parts = BlobUrlParts::parse(
            "https://myaccount.blob.core.windows.net/mycontainer/hello.txt?snapshot=yesterday",
        )
        .unwrap();
        assert!(parts.snapshot_time().is_err());
    }
}
