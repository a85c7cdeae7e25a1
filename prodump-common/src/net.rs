// Copyright 2021-Present Datadog, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{bail, Context};

/// Returns the whole hostname of the machine.
pub fn get_hostname() -> anyhow::Result<String> {
    let hostname_lossy = hostname::get()
        .context("failed to determine hostname")?
        .to_string_lossy()
        .to_string();
    if !is_valid_hostname(&hostname_lossy) {
        bail!("hostname `{hostname_lossy}` is invalid");
    }
    Ok(hostname_lossy)
}

/// Returns the first label of the hostname of the machine, e.g.
/// `node-1.us-east-1.example.com` yields `node-1`.
pub fn get_short_hostname() -> anyhow::Result<String> {
    let hostname = get_hostname()?;
    let short_hostname = hostname
        .split('.')
        .next()
        .context("failed to parse hostname")?;
    Ok(short_hostname.to_string())
}

/// Returns whether a hostname is valid according to [IETF RFC 1123](https://tools.ietf.org/html/rfc1123).
///
/// A hostname is valid if the following conditions are met:
///
/// - It does not start or end with `-` or `.`.
/// - It does not contain any characters outside of the alphanumeric range, except for `-` and `.`.
/// - It is not empty.
/// - It is 253 or fewer characters.
/// - Its labels (characters separated by `.`) are not empty.
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > 253 {
        return false;
    }
    if !hostname
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '.')
    {
        return false;
    }
    if hostname.split('.').any(|label| {
        label.is_empty() || label.len() > 63 || label.starts_with('-') || label.ends_with('-')
    }) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_hostname() {
        for hostname in &[
            "VaLiD-HoStNaMe",
            "50-name",
            "235235",
            "example.com",
            "VaLid.HoStNaMe",
            "123.456",
        ] {
            assert!(
                is_valid_hostname(hostname),
                "hostname `{hostname}` should be valid"
            );
        }
        for hostname in &[
            "-invalid-name",
            "also-invalid-",
            "asdf@fasd",
            "@asdfl",
            "asd f@",
            ".invalid",
            "invalid.name.",
            "foo.label-is-way-too-longgggggggggggggggggggggggggggggggggggggggggggggggggggggggggg.org",
            "",
        ] {
            assert!(
                !is_valid_hostname(hostname),
                "hostname `{hostname}` should be invalid"
            );
        }
    }

    #[test]
    fn test_get_short_hostname() {
        let short_hostname = get_short_hostname().unwrap();
        assert!(!short_hostname.is_empty());
        assert!(!short_hostname.contains('.'));
    }
}
