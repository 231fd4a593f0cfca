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

//! Helpers for clients built on top of a [`Pipeline`](crate::Pipeline).

use http::StatusCode;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;

use crate::{Error, Response, Result};

/// Characters left alone when escaping a single path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Join `root` and `paths` with exactly one `/` between each part.
///
/// A query string on `root` is moved to the end of the result.
///
/// ```
/// use azpipe_core::runtime::join_paths;
///
/// assert_eq!(
///     join_paths("https://management.azure.com/?a=b", &["/subscriptions/", "rg"]),
///     "https://management.azure.com/subscriptions/rg?a=b"
/// );
/// ```
pub fn join_paths(root: &str, paths: &[&str]) -> String {
    let (root, query) = match root.split_once('?') {
        Some((root, query)) => (root, Some(query)),
        None => (root, None),
    };

    let mut out = root.trim_end_matches('/').to_string();
    for path in paths {
        let path = path.trim_matches('/');
        if path.is_empty() {
            continue;
        }
        out.push('/');
        out.push_str(path);
    }
    if paths.last().is_some_and(|p| p.ends_with('/')) {
        out.push('/');
    }

    if let Some(query) = query {
        out.push('?');
        out.push_str(query);
    }
    out
}

/// Escape `segment` so it can be placed in a single path segment.
pub fn path_escape(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Check if the status of `resp` is one of `codes`.
pub fn has_status_code(resp: &Response, codes: &[StatusCode]) -> bool {
    codes.contains(&resp.status())
}

/// Deserialize the JSON body of `resp`.
///
/// An empty body is treated as JSON `null`.
pub fn unmarshal_json<T: DeserializeOwned>(resp: &Response) -> Result<T> {
    let body = resp.body();
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| {
        Error::unexpected(format!("failed to unmarshal response body: {e}")).with_source(e)
    })
}
