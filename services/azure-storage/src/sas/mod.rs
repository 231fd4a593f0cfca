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

//! Shared Access Signatures.
//!
//! - [Create a service SAS](https://learn.microsoft.com/en-us/rest/api/storageservices/create-service-sas)
//! - [Create an account SAS](https://learn.microsoft.com/en-us/rest/api/storageservices/create-account-sas)

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use azpipe_core::time::{format_iso8601, parse_rfc3339, DateTime};
use azpipe_core::{Error, Result};

mod account;
pub use account::{
    AccountSasPermissions, AccountSasResourceTypes, AccountSasServices, AccountSasSignatureValues,
};
mod blob;
pub use blob::{BlobSasPermissions, BlobSasSignatureValues};

/// Query names a SAS is made of, in the order they are emitted.
const SAS_QUERY_NAMES: &[&str] = &[
    "sv", "ss", "srt", "spr", "st", "se", "sip", "si", "sr", "sp", "sig", "rscc", "rscd", "rsce",
    "rscl", "rsct", "sdd",
];

/// Check if the query parameter `name` belongs to a SAS.
pub(crate) fn is_sas_query_name(name: &str) -> bool {
    SAS_QUERY_NAMES.contains(&name.to_ascii_lowercase().as_str())
}

/// Specifies the protocol permitted for a request made with the SAS ([Azure documentation](https://docs.microsoft.com/rest/api/storageservices/create-service-sas#specifying-the-http-protocol)).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SasProtocol {
    Https,
    HttpsAndHttp,
}

impl fmt::Display for SasProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SasProtocol::Https => write!(f, "https"),
            SasProtocol::HttpsAndHttp => write!(f, "https,http"),
        }
    }
}

impl FromStr for SasProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "https" => Ok(SasProtocol::Https),
            "https,http" | "http,https" => Ok(SasProtocol::HttpsAndHttp),
            v => Err(Error::validation(format!("invalid sas protocol: {v}"))),
        }
    }
}

/// IP address or inclusive range of addresses a SAS accepts requests from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IpRange {
    pub start: IpAddr,
    pub end: Option<IpAddr>,
}

impl IpRange {
    pub fn single(addr: IpAddr) -> Self {
        Self {
            start: addr,
            end: None,
        }
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}", self.start),
        }
    }
}

impl FromStr for IpRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse = |v: &str| {
            v.parse::<IpAddr>()
                .map_err(|e| Error::validation(format!("invalid sas ip range: {s}")).with_source(e))
        };
        match s.split_once('-') {
            Some((start, end)) => Ok(IpRange {
                start: parse(start)?,
                end: Some(parse(end)?),
            }),
            None => Ok(IpRange::single(parse(s)?)),
        }
    }
}

/// SasQueryParameters are the signed query parameters appended to a
/// resource URL.
///
/// Produced by [`BlobSasSignatureValues::sign`] and
/// [`AccountSasSignatureValues::sign_with_shared_key`], or parsed back from an
/// existing URL with [`SasQueryParameters::parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SasQueryParameters {
    pub(crate) version: String,
    pub(crate) services: Option<String>,
    pub(crate) resource_types: Option<String>,
    pub(crate) protocol: Option<SasProtocol>,
    pub(crate) start_time: Option<DateTime>,
    pub(crate) expiry_time: Option<DateTime>,
    pub(crate) ip_range: Option<IpRange>,
    pub(crate) identifier: Option<String>,
    pub(crate) resource: Option<String>,
    pub(crate) permissions: Option<String>,
    pub(crate) signature: String,
    pub(crate) cache_control: Option<String>,
    pub(crate) content_disposition: Option<String>,
    pub(crate) content_encoding: Option<String>,
    pub(crate) content_language: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) directory_depth: Option<String>,
}

impl SasQueryParameters {
    /// Parse the SAS parameters out of a query string.
    ///
    /// Parameters that are not part of a SAS are ignored. A leading `?` is
    /// accepted.
    pub fn parse(query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = SasQueryParameters::default();

        for (k, v) in form_urlencoded::parse(query.as_bytes()) {
            let v = v.into_owned();
            match k.to_ascii_lowercase().as_str() {
                "sv" => params.version = v,
                "ss" => params.services = Some(v),
                "srt" => params.resource_types = Some(v),
                "spr" => params.protocol = Some(v.parse()?),
                "st" => params.start_time = Some(parse_rfc3339(&v)?),
                "se" => params.expiry_time = Some(parse_rfc3339(&v)?),
                "sip" => params.ip_range = Some(v.parse()?),
                "si" => params.identifier = Some(v),
                "sr" => params.resource = Some(v),
                "sp" => params.permissions = Some(v),
                "sig" => params.signature = v,
                "rscc" => params.cache_control = Some(v),
                "rscd" => params.content_disposition = Some(v),
                "rsce" => params.content_encoding = Some(v),
                "rscl" => params.content_language = Some(v),
                "rsct" => params.content_type = Some(v),
                "sdd" => params.directory_depth = Some(v),
                _ => {}
            }
        }

        Ok(params)
    }

    /// Signed service version (`sv`).
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn services(&self) -> Option<&str> {
        self.services.as_deref()
    }

    pub fn resource_types(&self) -> Option<&str> {
        self.resource_types.as_deref()
    }

    pub fn protocol(&self) -> Option<SasProtocol> {
        self.protocol
    }

    pub fn start_time(&self) -> Option<DateTime> {
        self.start_time
    }

    pub fn expiry_time(&self) -> Option<DateTime> {
        self.expiry_time
    }

    pub fn ip_range(&self) -> Option<IpRange> {
        self.ip_range
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn permissions(&self) -> Option<&str> {
        self.permissions.as_deref()
    }

    /// Base64 encoded signature (`sig`).
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.cache_control.as_deref()
    }

    pub fn content_disposition(&self) -> Option<&str> {
        self.content_disposition.as_deref()
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    pub fn content_language(&self) -> Option<&str> {
        self.content_language.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn directory_depth(&self) -> Option<&str> {
        self.directory_depth.as_deref()
    }

    /// Key value pairs in emission order, values not yet encoded.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(8);
        let mut push = |k: &'static str, v: Option<String>| {
            if let Some(v) = v.filter(|v| !v.is_empty()) {
                pairs.push((k, v));
            }
        };

        push("sv", Some(self.version.clone()));
        push("ss", self.services.clone());
        push("srt", self.resource_types.clone());
        push("spr", self.protocol.map(|v| v.to_string()));
        push("st", self.start_time.map(format_iso8601));
        push("se", self.expiry_time.map(format_iso8601));
        push("sip", self.ip_range.map(|v| v.to_string()));
        push("si", self.identifier.clone());
        push("sr", self.resource.clone());
        push("sp", self.permissions.clone());
        push("sig", Some(self.signature.clone()));
        push("rscc", self.cache_control.clone());
        push("rscd", self.content_disposition.clone());
        push("rsce", self.content_encoding.clone());
        push("rscl", self.content_language.clone());
        push("rsct", self.content_type.clone());
        push("sdd", self.directory_depth.clone());

        pairs
    }

    /// Encode into a query string without the leading `?`.
    pub fn encode(&self) -> String {
        self.pairs()
            .into_iter()
            .map(|(k, v)| format!("{k}={}", urlencoded(&v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for SasQueryParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn urlencoded(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Sort `input` into the canonical `order`, rejecting unknown letters.
fn canonical_flags(input: &str, order: &str, what: &str) -> Result<String> {
    if let Some(c) = input.chars().find(|c| !order.contains(*c)) {
        return Err(Error::validation(format!("invalid {what} flag: {c}")));
    }
    Ok(order.chars().filter(|c| input.contains(*c)).collect())
}

/// Check the validity window of a SAS.
fn validate_window(start: Option<DateTime>, expiry: Option<DateTime>) -> Result<DateTime> {
    let expiry = expiry.ok_or_else(|| Error::validation("sas expiry time is required"))?;
    if let Some(start) = start {
        if expiry <= start {
            return Err(Error::validation(format!(
                "sas expiry {} must be after start {}",
                format_iso8601(expiry),
                format_iso8601(start)
            )));
        }
    }
    Ok(expiry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use azpipe_core::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;
    use test_case::test_case;

    #[test]
    fn test_parse_and_encode() {
        let query = "?sv=2020-02-10&spr=https&st=2022-03-01T08%3A12%3A34Z&se=2022-03-01T09%3A12%3A34Z&sip=10.0.0.1-10.0.0.9&sr=b&sp=rw&sig=abc%2Bdef%3D&comp=list";
        let params = SasQueryParameters::parse(query).unwrap();

        assert_eq!(params.version(), "2020-02-10");
        assert_eq!(params.protocol(), Some(SasProtocol::Https));
        assert_eq!(
            params.ip_range(),
            Some(IpRange {
                start: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                end: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9))),
            })
        );
        assert_eq!(params.signature(), "abc+def=");
        assert_eq!(params.resource(), Some("b"));

        // comp is not part of the SAS.
        assert_eq!(
            params.encode(),
            "sv=2020-02-10&spr=https&st=2022-03-01T08%3A12%3A34Z&se=2022-03-01T09%3A12%3A34Z&sip=10.0.0.1-10.0.0.9&sr=b&sp=rw&sig=abc%2Bdef%3D"
        );
    }

    #[test_case("https", SasProtocol::Https)]
    #[test_case("https,http", SasProtocol::HttpsAndHttp)]
    #[test_case("http,https", SasProtocol::HttpsAndHttp)]
    fn test_parse_protocol(input: &str, expected: SasProtocol) {
        assert_eq!(input.parse::<SasProtocol>().unwrap(), expected);
    }

    #[test]
    fn test_parse_invalid_time() {
        let err = SasQueryParameters::parse("se=tomorrow").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test_case("rw", "rwdx", "rw")]
    #[test_case("xwr", "rwdx", "rwx")]
    #[test_case("", "rwdx", "")]
    fn test_canonical_flags(input: &str, order: &str, expected: &str) {
        assert_eq!(canonical_flags(input, order, "permission").unwrap(), expected);
    }

    #[test]
    fn test_canonical_flags_unknown() {
        let err = canonical_flags("rz", "rw", "permission").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
