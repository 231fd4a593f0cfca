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

use log::debug;

use azpipe_core::time::{format_iso8601, DateTime};
use azpipe_core::{Error, Result};

use super::{canonical_flags, validate_window, IpRange, SasProtocol, SasQueryParameters};
use crate::constants::SAS_VERSION;
use crate::{SharedKeyCredential, StorageCredential};

const ACCOUNT_PERMISSION_ORDER: &str = "rwdxlacuptfiy";
const ACCOUNT_SERVICE_ORDER: &str = "bqtf";
const ACCOUNT_RESOURCE_TYPE_ORDER: &str = "sco";

/// Permissions granted by an account SAS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountSasPermissions {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub delete_previous_version: bool,
    pub list: bool,
    pub add: bool,
    pub create: bool,
    pub update: bool,
    pub process: bool,
    pub tag: bool,
    pub filter_by_tags: bool,
    pub set_immutability_policy: bool,
    pub permanent_delete: bool,
}

impl fmt::Display for AccountSasPermissions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let flags = [
            ('r', self.read),
            ('w', self.write),
            ('d', self.delete),
            ('x', self.delete_previous_version),
            ('l', self.list),
            ('a', self.add),
            ('c', self.create),
            ('u', self.update),
            ('p', self.process),
            ('t', self.tag),
            ('f', self.filter_by_tags),
            ('i', self.set_immutability_policy),
            ('y', self.permanent_delete),
        ];
        for (c, set) in flags {
            if set {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Services an account SAS is valid for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountSasServices {
    pub blob: bool,
    pub queue: bool,
    pub table: bool,
    pub file: bool,
}

impl fmt::Display for AccountSasServices {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (c, set) in [
            ('b', self.blob),
            ('q', self.queue),
            ('t', self.table),
            ('f', self.file),
        ] {
            if set {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Resource types an account SAS grants access to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountSasResourceTypes {
    pub service: bool,
    pub container: bool,
    pub object: bool,
}

impl fmt::Display for AccountSasResourceTypes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (c, set) in [
            ('s', self.service),
            ('c', self.container),
            ('o', self.object),
        ] {
            if set {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// AccountSasSignatureValues describes an account SAS.
///
/// - [Create an account SAS](https://learn.microsoft.com/en-us/rest/api/storageservices/create-account-sas#construct-the-signature-string)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSasSignatureValues {
    pub version: String,
    pub protocol: Option<SasProtocol>,
    pub start_time: Option<DateTime>,
    pub expiry_time: Option<DateTime>,
    pub permissions: String,
    pub ip_range: Option<IpRange>,
    pub services: String,
    pub resource_types: String,
}

impl Default for AccountSasSignatureValues {
    fn default() -> Self {
        Self {
            version: SAS_VERSION.to_string(),
            protocol: None,
            start_time: None,
            expiry_time: None,
            permissions: String::new(),
            ip_range: None,
            services: String::new(),
            resource_types: String::new(),
        }
    }
}

impl AccountSasSignatureValues {
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
        let permissions =
            canonical_flags(&self.permissions, ACCOUNT_PERMISSION_ORDER, "account permission")?;
        let services = canonical_flags(&self.services, ACCOUNT_SERVICE_ORDER, "account service")?;
        let resource_types = canonical_flags(
            &self.resource_types,
            ACCOUNT_RESOURCE_TYPE_ORDER,
            "account resource type",
        )?;

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
            cred.account_name(),
            permissions,
            services,
            resource_types,
            self.start_time.map(format_iso8601).unwrap_or_default(),
            format_iso8601(expiry),
            self.ip_range.map(|v| v.to_string()).unwrap_or_default(),
            self.protocol.map(|v| v.to_string()).unwrap_or_default(),
            self.version,
        );
        debug!("account sas string to sign: {}", &string_to_sign);

        Ok(SasQueryParameters {
            version: self.version.clone(),
            services: Some(services),
            resource_types: Some(resource_types),
            protocol: self.protocol,
            start_time: self.start_time,
            expiry_time: Some(expiry),
            ip_range: self.ip_range,
            permissions: Some(permissions),
            signature: cred.compute_hmac_sha256(&string_to_sign),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azpipe_core::hash::base64_encode;
    use azpipe_core::time::parse_rfc3339;
    use azpipe_core::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_can_generate_sas_token() {
        let cred = SharedKeyCredential::new("account", &base64_encode("key".as_bytes())).unwrap();
        let values = AccountSasSignatureValues {
            version: "2018-11-09".to_string(),
            expiry_time: Some(parse_rfc3339("2022-03-01T08:17:34Z").unwrap()),
            permissions: "rwdlacu".to_string(),
            services: "bqtf".to_string(),
            resource_types: "sco".to_string(),
            ..Default::default()
        };

        let params = values.sign_with_shared_key(&cred).unwrap();
        assert_eq!(
            params.encode(),
            "sv=2018-11-09&ss=bqtf&srt=sco&se=2022-03-01T08%3A17%3A34Z&sp=rwdlacu&sig=jgK9nDUT0ntH%2Fp28LPs0jzwxsk91W6hePLPlfrElv4k%3D"
        );
    }

    #[test]
    fn test_flags_are_normalized() {
        let cred = SharedKeyCredential::new("account", &base64_encode("key".as_bytes())).unwrap();
        let values = AccountSasSignatureValues {
            version: "2018-11-09".to_string(),
            expiry_time: Some(parse_rfc3339("2022-03-01T08:17:34Z").unwrap()),
            permissions: "ucaldwr".to_string(),
            services: "ftqb".to_string(),
            resource_types: "ocs".to_string(),
            ..Default::default()
        };

        let params = values.sign_with_shared_key(&cred).unwrap();
        assert_eq!(params.permissions(), Some("rwdlacu"));
        assert_eq!(params.services(), Some("bqtf"));
        assert_eq!(params.resource_types(), Some("sco"));
        assert_eq!(
            params.signature(),
            "jgK9nDUT0ntH/p28LPs0jzwxsk91W6hePLPlfrElv4k="
        );
    }

    #[test]
    fn test_sign_requires_shared_key() {
        let values = AccountSasSignatureValues {
            expiry_time: Some(parse_rfc3339("2022-03-01T08:17:34Z").unwrap()),
            ..Default::default()
        };
        let err = values.sign(&StorageCredential::Anonymous).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_display_flags() {
        let services = AccountSasServices {
            file: true,
            blob: true,
            ..Default::default()
        };
        assert_eq!(services.to_string(), "bf");

        let types = AccountSasResourceTypes {
            object: true,
            container: true,
            ..Default::default()
        };
        assert_eq!(types.to_string(), "co");

        let perms = AccountSasPermissions {
            permanent_delete: true,
            read: true,
            list: true,
            ..Default::default()
        };
        assert_eq!(perms.to_string(), "rly");
    }
}
