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

//! Cloud endpoints.

use std::collections::HashMap;

/// Services whose endpoints differ between clouds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceName {
    ResourceManager,
}

/// Endpoint and token audience of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfiguration {
    /// Audience used to build token scopes, `<audience>/.default`.
    pub audience: String,
    /// Base URL requests are sent to.
    pub endpoint: String,
}

/// CloudConfiguration describes one cloud: its authority host and the
/// endpoints of the services in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudConfiguration {
    /// Authority host for Microsoft Entra ID.
    pub authority_host: String,
    pub services: HashMap<ServiceName, ServiceConfiguration>,
}

impl Default for CloudConfiguration {
    fn default() -> Self {
        Self::azure_public()
    }
}

impl CloudConfiguration {
    fn preset(authority_host: &str, audience: &str, endpoint: &str) -> Self {
        Self {
            authority_host: authority_host.to_string(),
            services: HashMap::from([(
                ServiceName::ResourceManager,
                ServiceConfiguration {
                    audience: audience.to_string(),
                    endpoint: endpoint.to_string(),
                },
            )]),
        }
    }

    /// Azure public cloud.
    pub fn azure_public() -> Self {
        Self::preset(
            "https://login.microsoftonline.com/",
            "https://management.core.windows.net/",
            "https://management.azure.com",
        )
    }

    /// Azure operated by 21Vianet in China.
    pub fn azure_china() -> Self {
        Self::preset(
            "https://login.chinacloudapi.cn/",
            "https://management.core.chinacloudapi.cn",
            "https://management.chinacloudapi.cn",
        )
    }

    /// Azure US Government.
    pub fn azure_government() -> Self {
        Self::preset(
            "https://login.microsoftonline.us/",
            "https://management.core.usgovcloudapi.net",
            "https://management.usgovcloudapi.net",
        )
    }

    /// Override the configuration of `service`.
    pub fn with_service(mut self, service: ServiceName, config: ServiceConfiguration) -> Self {
        self.services.insert(service, config);
        self
    }

    /// Get the configuration of `service`, if this cloud knows it.
    pub fn service(&self, service: ServiceName) -> Option<&ServiceConfiguration> {
        self.services.get(&service)
    }
}

impl ServiceConfiguration {
    /// The `.default` scope for this audience.
    pub fn default_scope(&self) -> String {
        format!("{}/.default", self.audience.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let public = CloudConfiguration::default();
        let arm = public.service(ServiceName::ResourceManager).unwrap();
        assert_eq!(arm.endpoint, "https://management.azure.com");
        assert_eq!(arm.default_scope(), "https://management.core.windows.net/.default");

        let china = CloudConfiguration::azure_china();
        assert_eq!(
            china.service(ServiceName::ResourceManager).unwrap().default_scope(),
            "https://management.core.chinacloudapi.cn/.default"
        );
        assert_eq!(
            CloudConfiguration::azure_government().authority_host,
            "https://login.microsoftonline.us/"
        );
    }

    #[test]
    fn test_override_service() {
        let cloud = CloudConfiguration::azure_public().with_service(
            ServiceName::ResourceManager,
            ServiceConfiguration {
                audience: "https://management.local".to_string(),
                endpoint: "https://localhost:8443".to_string(),
            },
        );

        assert_eq!(
            cloud.service(ServiceName::ResourceManager).unwrap().endpoint,
            "https://localhost:8443"
        );
    }
}
