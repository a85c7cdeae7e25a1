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

pub mod net;

use std::fmt::Debug;
use std::str::FromStr;

use tracing::{error, info};

/// Reads a value from the environment, falling back to `default_value` when
/// the variable is unset or fails to parse.
pub fn get_from_env<T: FromStr + Debug>(key: &str, default_value: T) -> T {
    if let Ok(value_str) = std::env::var(key) {
        if let Ok(value) = T::from_str(&value_str) {
            info!(value=?value, "setting `{}` from environment", key);
            return value;
        } else {
            error!(value_str=%value_str, "failed to parse `{}` from environment", key);
        }
    }
    default_value
}

pub fn get_bool_from_env(key: &str, default_value: bool) -> bool {
    if let Ok(value_str) = std::env::var(key) {
        match value_str.to_lowercase().as_str() {
            "true" | "1" | "yes" => return true,
            "false" | "0" | "no" => return false,
            _ => {
                error!(value_str=%value_str, "failed to parse `{}` from environment", key);
            }
        }
    }
    default_value
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_get_from_env() {
        const TEST_KEY: &str = "TEST_GET_FROM_ENV_KEY";
        assert_eq!(super::get_from_env(TEST_KEY, 10), 10);
        std::env::set_var(TEST_KEY, "15");
        assert_eq!(super::get_from_env(TEST_KEY, 10), 15);
        std::env::set_var(TEST_KEY, "1invalidnumber");
        assert_eq!(super::get_from_env(TEST_KEY, 10), 10);
        std::env::remove_var(TEST_KEY);
    }

    #[test]
    fn test_get_bool_from_env() {
        const TEST_KEY: &str = "TEST_GET_BOOL_FROM_ENV_KEY";
        assert!(!super::get_bool_from_env(TEST_KEY, false));
        std::env::set_var(TEST_KEY, "true");
        assert!(super::get_bool_from_env(TEST_KEY, false));
        std::env::set_var(TEST_KEY, "FALSE");
        assert!(!super::get_bool_from_env(TEST_KEY, true));
        std::env::set_var(TEST_KEY, "maybe");
        assert!(super::get_bool_from_env(TEST_KEY, true));
        std::env::remove_var(TEST_KEY);
    }
}
