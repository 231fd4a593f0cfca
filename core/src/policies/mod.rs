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

//! Built-in policies assembled by [`Pipeline::new`](crate::Pipeline::new).

mod api_version;
pub use api_version::ApiVersionLocation;
pub use api_version::ApiVersionOptions;
pub use api_version::ApiVersionPolicy;

mod logging;
pub use logging::LoggingOptions;
pub use logging::LoggingPolicy;

mod request_id;
pub use request_id::RequestIdPolicy;
pub use request_id::X_MS_CLIENT_REQUEST_ID;

mod telemetry;
pub use telemetry::TelemetryOptions;
pub use telemetry::TelemetryPolicy;
