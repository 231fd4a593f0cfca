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

use std::collections::HashMap;

use azpipe_core::{Error, Result};

use crate::{Config, Service};

const AZURITE_ACCOUNT_NAME: &str = "devstoreaccount1";
const AZURITE_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const AZURITE_BLOB_URI: &str = "http://127.0.0.1:10000";

/// Parses an [Azure connection string][1].
///
/// [1]: https://learn.microsoft.com/en-us/azure/storage/common/storage-configure-connection-string
pub(crate) fn parse(conn_str: &str, service: Service) -> Result<Config> {
    let fields = split_fields(conn_str)?;
    let get = |key: &str| fields.get(key).cloned();

    // Azurite only serves blobs.
    if service == Service::Blob && get("UseDevelopmentStorage").as_deref() == Some("true") {
        let account_name = get("AccountName").unwrap_or_else(|| AZURITE_ACCOUNT_NAME.to_string());
        let proxy = get("DevelopmentStorageProxyUri").unwrap_or_else(|| AZURITE_BLOB_URI.to_string());
        return Ok(Config {
            endpoint: Some(format!("{proxy}/{account_name}")),
            account_key: Some(get("AccountKey").unwrap_or_else(|| AZURITE_ACCOUNT_KEY.to_string())),
            account_name: Some(account_name),
            ..Default::default()
        });
    }

    let mut config = Config {
        account_name: get("AccountName"),
        endpoint: endpoint(&fields, service)?,
        ..Default::default()
    };

    // A SAS wins over the account key. Bearer tokens never come from a
    // connection string.
    if let Some(token) = get("SharedAccessSignature") {
        config.sas_token = Some(token);
    } else if config.account_name.is_some() {
        config.account_key = get("AccountKey");
    }

    Ok(config)
}

fn split_fields(conn_str: &str) -> Result<HashMap<String, String>> {
    conn_str
        .trim()
        .replace('\n', "")
        .split(';')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| {
            let (key, value) = field.split_once('=').ok_or_else(|| {
                Error::config(format!(
                    "invalid connection string, expected '=' in field: {field}"
                ))
            })?;
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

/// An explicit `<Service>Endpoint` wins, otherwise the endpoint is built from
/// the account name and suffix when both are present.
fn endpoint(fields: &HashMap<String, String>, service: Service) -> Result<Option<String>> {
    if let Some(endpoint) = service.endpoint_key().and_then(|key| fields.get(key)) {
        return Ok(Some(endpoint.clone()));
    }

    let (Some(account_name), Some(suffix)) =
        (fields.get("AccountName"), fields.get("EndpointSuffix"))
    else {
        return Ok(None);
    };

    let protocol = fields
        .get("DefaultEndpointsProtocol")
        .map(String::as_str)
        .unwrap_or("https");
    if protocol != "http" && protocol != "https" {
        return Err(Error::config(format!(
            "invalid DefaultEndpointsProtocol: {protocol}"
        )));
    }

    Ok(Some(format!(
        "{protocol}://{account_name}.{}.{suffix}",
        service.endpoint_name()
    )))
}
