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

use std::fmt;
use std::str::FromStr;

use log::debug;

use azpipe_core::time::{format_iso8601, format_snapshot, DateTime};
use azpipe_core::{Error, Result};

use super::{canonical_flags, validate_window, IpRange, SasProtocol, SasQueryParameters};
use crate::constants::SAS_VERSION;
use crate::{SharedKeyCredential, StorageCredential};

const BLOB_PERMISSION_ORDER: &str = "racwdxltmeopi";

/// Permissions granted by a blob or container SAS.
///
/// Rendered in the fixed order `racwdxltmeopi` whatever order they were
/// set in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobSasPermissions {
    pub read: bool,
    pub add: bool,
    pub create: bool,
    pub write: bool,
    pub delete: bool,
    pub delete_previous_version: bool,
    pub list: bool,
    pub tag: bool,
    pub move_: bool,
    pub execute: bool,
    pub ownership: bool,
    pub permissions: bool,
    pub set_immutability_policy: bool,
}

impl BlobSasPermissions {
    fn flags(&self) -> [(char, bool); 13] {
        [
            ('r', self.read),
            ('a', self.add),
            ('c', self.create),
            ('w', self.write),
            ('d', self.delete),
            ('x', self.delete_previous_version),
            ('l', self.list),
            ('t', self.tag),
            ('m', self.move_),
            ('e', self.execute),
            ('o', self.ownership),
            ('p', self.permissions),
            ('i', self.set_immutability_policy),
        ]
    }
}

impl fmt::Display for BlobSasPermissions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (c, set) in self.flags() {
            if set {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for BlobSasPermissions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut p = BlobSasPermissions::default();
        for c in s.chars() {
            match c {
                'r' => p.read = true,
                'a' => p.add = true,
                'c' => p.create = true,
                'w' => p.write = true,
                'd' => p.delete = true,
                'x' => p.delete_previous_version = true,
                'l' => p.list = true,
                't' => p.tag = true,
                'm' => p.move_ = true,
                'e' => p.execute = true,
                'o' => p.ownership = true,
                'p' => p.permissions = true,
                'i' => p.set_immutability_policy = true,
                v => return Err(Error::validation(format!("invalid blob permission: {v}"))),
            }
        }
        Ok(p)
    }
}

/// BlobSasSignatureValues describes a service SAS for a container or a blob.
///
/// Leave `blob_name` empty to sign for the whole container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobSasSignatureValues {
    /// Signed service version, defaults to `2020-02-10`.
    pub version: String,
    pub protocol: Option<SasProtocol>,
    pub start_time: Option<DateTime>,
    pub expiry_time: Option<DateTime>,
    /// Accepts any of `racwdxltmeopi` in any order, see [`BlobSasPermissions`].
    pub permissions: String,
    pub ip_range: Option<IpRange>,
    /// Name of a stored access policy on the container.
    pub identifier: Option<String>,
    pub container_name: String,
    pub blob_name: Option<String>,
    pub snapshot_time: Option<DateTime>,
    pub version_id: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub content_type: Option<String>,
}

impl Default for BlobSasSignatureValues {
    fn default() -> Self {
        Self {
            version: SAS_VERSION.to_string(),
            protocol: None,
            start_time: None,
            expiry_time: None,
            permissions: String::new(),
            ip_range: None,
            identifier: None,
            container_name: String::new(),
            blob_name: None,
            snapshot_time: None,
            version_id: None,
            cache_control: None,
            content_disposition: None,
            content_encoding: None,
            content_language: None,
            content_type: None,
        }
    }
}

impl BlobSasSignatureValues {
    /// Sign with `credential`.
    ///
    /// Only shared key credentials can sign, anything else is a config error.
    pub fn sign(&self, credential: &StorageCredential) -> Result<SasQueryParameters> {
        match credential.as_shared_key() {
            Some(cred) => self.sign_with_shared_key(cred),
            None => Err(Error::config(
                "sas signing requires a shared key credential",
            )),
        }
    }

    pub fn sign_with_shared_key(&self, cred: &SharedKeyCredential) -> Result<SasQueryParameters> {
        let expiry = validate_window(self.start_time, self.expiry_time)?;
        let permissions = canonical_flags(&self.permissions, BLOB_PERMISSION_ORDER, "blob permission")?;

        let resource = self.resource();
        // The snapshot line carries the version id when no snapshot is set.
        let snapshot = self
            .snapshot_time
            .map(format_snapshot)
            .or_else(|| self.version_id.clone());

        let start = self.start_time.map(format_iso8601).unwrap_or_default();
        let expiry_str = format_iso8601(expiry);
        let canonical_resource = self.canonical_resource(cred.account_name());
        let ip_range = self.ip_range.map(|v| v.to_string()).unwrap_or_default();
        let protocol = self.protocol.map(|v| v.to_string()).unwrap_or_default();
        let lines: [&str; 15] = [
            &permissions,
            &start,
            &expiry_str,
            &canonical_resource,
            self.identifier.as_deref().unwrap_or_default(),
            &ip_range,
            &protocol,
            &self.version,
            resource,
            snapshot.as_deref().unwrap_or_default(),
            self.cache_control.as_deref().unwrap_or_default(),
            self.content_disposition.as_deref().unwrap_or_default(),
            self.content_encoding.as_deref().unwrap_or_default(),
            self.content_language.as_deref().unwrap_or_default(),
            self.content_type.as_deref().unwrap_or_default(),
        ];
        let string_to_sign = lines.join("\n");
        debug!("sas string to sign: {}", &string_to_sign);

        Ok(SasQueryParameters {
            version: self.version.clone(),
            protocol: self.protocol,
            start_time: self.start_time,
            expiry_time: Some(expiry),
            ip_range: self.ip_range,
            identifier: self.identifier.clone(),
            resource: Some(resource.to_string()),
            permissions: Some(permissions),
            signature: cred.compute_hmac_sha256(&string_to_sign),
            cache_control: self.cache_control.clone(),
            content_disposition: self.content_disposition.clone(),
            content_encoding: self.content_encoding.clone(),
            content_language: self.content_language.clone(),
            content_type: self.content_type.clone(),
            ..Default::default()
        })
    }

    fn blob_name(&self) -> Option<&str> {
        self.blob_name.as_deref().filter(|v| !v.is_empty())
    }

    fn resource(&self) -> &'static str {
        if self.snapshot_time.is_some() {
            "bs"
        } else if self.version_id.is_some() {
            "bv"
        } else if self.blob_name().is_none() {
            "c"
        } else {
            "b"
        }
    }

    fn canonical_resource(&self, account_name: &str) -> String {
        match self.blob_name() {
            Some(blob) => format!("/blob/{}/{}/{}", account_name, self.container_name, blob),
            None => format!("/blob/{}/{}", account_name, self.container_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azpipe_core::time::parse_rfc3339;
    use azpipe_core::ErrorKind;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    const KEY: &str =
        "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

    fn cred() -> SharedKeyCredential {
        SharedKeyCredential::new("devstoreaccount1", KEY).unwrap()
    }

    fn t(s: &str) -> DateTime {
        parse_rfc3339(s).unwrap()
    }

    fn blob_values() -> BlobSasSignatureValues {
        BlobSasSignatureValues {
            protocol: Some(SasProtocol::Https),
            start_time: Some(t("2022-03-01T08:12:34Z")),
            expiry_time: Some(t("2022-03-01T09:12:34Z")),
            permissions: "wr".to_string(),
            container_name: "mycontainer".to_string(),
            blob_name: Some("hello.txt".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_sign_blob() {
        let params = blob_values().sign_with_shared_key(&cred()).unwrap();

        assert_eq!(params.permissions(), Some("rw"));
        assert_eq!(params.resource(), Some("b"));
        assert_eq!(params.signature(), "shQWiGJuStvmpWYoErvD1WKoucwUSTA2aUhEeuzp4EY=");
        assert_eq!(
            params.encode(),
            "sv=2020-02-10&spr=https&st=2022-03-01T08%3A12%3A34Z&se=2022-03-01T09%3A12%3A34Z&sr=b&sp=rw&sig=shQWiGJuStvmpWYoErvD1WKoucwUSTA2aUhEeuzp4EY%3D"
        );
    }

    #[test]
    fn test_sign_container() {
        let values = BlobSasSignatureValues {
            expiry_time: Some(t("2022-03-01T09:12:34Z")),
            permissions: "lr".to_string(),
            container_name: "mycontainer".to_string(),
            ..Default::default()
        };
        let params = values.sign_with_shared_key(&cred()).unwrap();

        assert_eq!(params.resource(), Some("c"));
        assert_eq!(params.permissions(), Some("rl"));
        assert_eq!(params.signature(), "UjbDHv8YM5H32oT1vtq29ZhGUaJ0ep3oGMwrNUfGAw4=");
    }

    #[test]
    fn test_sign_snapshot() {
        let values = BlobSasSignatureValues {
            expiry_time: Some(t("2022-03-01T09:12:34Z")),
            permissions: "r".to_string(),
            container_name: "mycontainer".to_string(),
            blob_name: Some("hello.txt".to_string()),
            snapshot_time: Some(t("2022-03-01T08:12:34Z")),
            version_id: Some("2022-03-01T08:00:00.0000000Z".to_string()),
            ..Default::default()
        };
        let params = values.sign_with_shared_key(&cred()).unwrap();

        assert_eq!(params.resource(), Some("bs"));
        assert_eq!(params.signature(), "ii1+UuvUKVTANpKK8ghBR2O3oKRdJYZ94ljt7aoiAp4=");
    }

    #[test]
    fn test_sign_is_deterministic() {
        let a = blob_values().sign_with_shared_key(&cred()).unwrap();
        let b = blob_values().sign_with_shared_key(&cred()).unwrap();
        assert_eq!(a, b);
    }

    #[test_case(|v| v.permissions = "r".to_string(); "permissions")]
    #[test_case(|v| v.start_time = Some(t("2022-03-01T08:00:00Z")); "start")]
    #[test_case(|v| v.expiry_time = Some(t("2022-03-01T10:00:00Z")); "expiry")]
    #[test_case(|v| v.container_name = "other".to_string(); "container")]
    #[test_case(|v| v.blob_name = Some("other.txt".to_string()); "blob")]
    #[test_case(|v| v.identifier = Some("policy-1".to_string()); "identifier")]
    #[test_case(|v| v.ip_range = Some(IpRange::single("10.0.0.1".parse().unwrap())); "ip range")]
    #[test_case(|v| v.protocol = Some(SasProtocol::HttpsAndHttp); "protocol")]
    #[test_case(|v| v.version = "2019-12-12".to_string(); "version")]
    #[test_case(|v| v.snapshot_time = Some(t("2022-03-01T08:12:34Z")); "snapshot")]
    #[test_case(|v| v.version_id = Some("2022-03-01T08:00:00.0000000Z".to_string()); "version id")]
    #[test_case(|v| v.cache_control = Some("no-cache".to_string()); "cache control")]
    #[test_case(|v| v.content_disposition = Some("attachment".to_string()); "content disposition")]
    #[test_case(|v| v.content_encoding = Some("gzip".to_string()); "content encoding")]
    #[test_case(|v| v.content_language = Some("en-US".to_string()); "content language")]
    #[test_case(|v| v.content_type = Some("text/plain".to_string()); "content type")]
    fn test_every_field_changes_signature(change: fn(&mut BlobSasSignatureValues)) {
        let baseline = blob_values().sign_with_shared_key(&cred()).unwrap();

        let mut values = blob_values();
        change(&mut values);
        let changed = values.sign_with_shared_key(&cred()).unwrap();

        assert_ne!(baseline.signature(), changed.signature());
    }

    #[test]
    fn test_version_id_resource() {
        let mut values = blob_values();
        values.version_id = Some("2022-03-01T08:00:00.0000000Z".to_string());
        let params = values.sign_with_shared_key(&cred()).unwrap();

        assert_eq!(params.resource(), Some("bv"));
        assert_ne!(
            params.signature(),
            blob_values().sign_with_shared_key(&cred()).unwrap().signature()
        );
    }

    #[test]
    fn test_sign_requires_shared_key() {
        let err = blob_values()
            .sign(&StorageCredential::Anonymous)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let params = blob_values().sign(&StorageCredential::SharedKey(cred())).unwrap();
        assert_eq!(params.resource(), Some("b"));
    }

    #[test_case(None, None; "missing expiry")]
    #[test_case(Some("2022-03-01T09:12:34Z"), Some("2022-03-01T08:12:34Z"); "expiry before start")]
    #[test_case(Some("2022-03-01T09:12:34Z"), Some("2022-03-01T09:12:34Z"); "expiry equals start")]
    fn test_invalid_window(start: Option<&str>, expiry: Option<&str>) {
        let values = BlobSasSignatureValues {
            start_time: start.map(t),
            expiry_time: expiry.map(t),
            ..blob_values()
        };
        let err = values.sign_with_shared_key(&cred()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_permissions_display() {
        let p: BlobSasPermissions = "ipoemtlxdwcar".parse().unwrap();
        assert_eq!(p.to_string(), "racwdxltmeopi");

        let p = BlobSasPermissions {
            write: true,
            read: true,
            ..Default::default()
        };
        assert_eq!(p.to_string(), "rw");

        assert!("rq".parse::<BlobSasPermissions>().is_err());
    }
}
