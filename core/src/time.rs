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

//! Time related utils.

use crate::Error;
use chrono::SecondsFormat;
use chrono::Utc;

/// DateTime is the alias for chrono::DateTime<Utc>.
pub type DateTime = chrono::DateTime<Utc>;

/// Create datetime of now.
pub fn now() -> DateTime {
    Utc::now()
}

/// Format time into http date: `Sun, 06 Nov 1994 08:49:37 GMT`
///
/// ## Note
///
/// HTTP date is slightly different from RFC2822.
///
/// - Timezone is fixed to GMT.
/// - Day must be 2 digit.
pub fn format_http_date(t: DateTime) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Format time into the second precision ISO 8601 form used by SAS tokens:
/// `2022-03-13T07:20:04Z`
pub fn format_iso8601(t: DateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Format time with seven fractional digits: `2022-03-13T07:20:04.1234567Z`
///
/// This is the form blob snapshots are addressed with.
pub fn format_snapshot(t: DateTime) -> String {
    // chrono only offers 3, 6 or 9 fractional digits.
    let mut s = t.format("%Y-%m-%dT%H:%M:%S%.9f").to_string();
    s.truncate(s.len() - 2);
    s.push('Z');
    s
}

/// Format time into RFC3339: `2022-03-13T07:20:04Z`
pub fn format_rfc3339(t: DateTime) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse time from RFC3339.
///
/// All of them are valid time:
///
/// - `2022-03-13T07:20:04Z`
/// - `2022-03-01T08:12:34+00:00`
/// - `2022-03-01T08:12:34.00+00:00`
pub fn parse_rfc3339(s: &str) -> crate::Result<DateTime> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|v| v.with_timezone(&Utc))
        .map_err(|e| Error::validation(format!("invalid rfc3339 time: {s}")).with_source(e))
}

/// Parse time from RFC2822.
///
/// `Retry-After` and `Date` headers use this form.
pub fn parse_rfc2822(s: &str) -> crate::Result<DateTime> {
    chrono::DateTime::parse_from_rfc2822(s)
        .map(|v| v.with_timezone(&Utc))
        .map_err(|e| Error::validation(format!("invalid rfc2822 time: {s}")).with_source(e))
}

/// Parse a unix timestamp in seconds.
pub fn parse_unix_seconds(s: &str) -> crate::Result<DateTime> {
    let secs: i64 = s
        .trim()
        .parse()
        .map_err(|e| Error::validation(format!("invalid unix timestamp: {s}")).with_source(e))?;
    chrono::DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::validation(format!("unix timestamp out of range: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_time() -> DateTime {
        Utc.with_ymd_and_hms(2022, 3, 1, 8, 12, 34).unwrap()
    }

    #[test]
    fn test_format_http_date() {
        let t = test_time();
        assert_eq!("Tue, 01 Mar 2022 08:12:34 GMT", format_http_date(t))
    }

    #[test]
    fn test_format_iso8601() {
        let t = test_time();
        assert_eq!("2022-03-01T08:12:34Z", format_iso8601(t))
    }

    #[test]
    fn test_format_snapshot() {
        let t = test_time() + chrono::Duration::nanoseconds(123_456_789);
        assert_eq!("2022-03-01T08:12:34.1234567Z", format_snapshot(t))
    }

    #[test]
    fn test_format_rfc3339() {
        let t = test_time();
        assert_eq!("2022-03-01T08:12:34Z", format_rfc3339(t))
    }

    #[test]
    fn test_parse_rfc3339() {
        let t = test_time();

        for v in [
            "2022-03-01T08:12:34Z",
            "2022-03-01T08:12:34+00:00",
            "2022-03-01T08:12:34.00+00:00",
        ] {
            assert_eq!(t, parse_rfc3339(v).expect("must be valid time"));
        }
    }

    #[test]
    fn test_parse_unix_seconds() {
        assert_eq!(test_time(), parse_unix_seconds("1646122354").unwrap());
        assert!(parse_unix_seconds("soon").is_err());
    }
}
