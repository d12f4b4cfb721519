/*
 * SPDX-FileCopyrightText: Copyright (c) 2022 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: MIT
 *
 * Permission is hereby granted, free of charge, to any person obtaining a
 * copy of this software and associated documentation files (the "Software"),
 * to deal in the Software without restriction, including without limitation
 * the rights to use, copy, modify, merge, publish, distribute, sublicense,
 * and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in
 * all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
 * THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
 * FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
 * DEALINGS IN THE SOFTWARE.
 */

// Playbooks spell switches as booleans, "yes"/"no",
// "enabled"/"disabled", "on"/"off" and sometimes "true"/"false" strings.
// Everything is normalized to `bool` here, at the parsing boundary.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde_with::DeserializeAs;

/// `serde_as` adapter that reads any accepted spelling of a switch into a `bool`.
///
/// ```ignore
/// #[serde_as(as = "Flag")]
/// reboot_on_update: bool,
/// ```
pub struct Flag;

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "enabled" | "enable" | "on" | "1" => Some(true),
        "false" | "no" | "disabled" | "disable" | "off" | "0" => Some(false),
        _ => None,
    }
}

struct FlagVisitor;

impl<'de> Visitor<'de> for FlagVisitor {
    type Value = bool;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a boolean, yes/no, enabled/disabled, on/off or 1/0")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
        match v {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(E::invalid_value(de::Unexpected::Unsigned(v), &self)),
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
        match v {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
        parse_flag(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> DeserializeAs<'de, bool> for Flag {
    fn deserialize_as<D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FlagVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use serde_with::serde_as;

    #[serde_as]
    #[derive(Deserialize, Debug)]
    struct Params {
        #[serde_as(as = "Flag")]
        reapply: bool,
        #[serde_as(as = "Option<Flag>")]
        #[serde(default)]
        boot_drive: Option<bool>,
    }

    #[test]
    fn test_all_spellings_normalize() {
        for (raw, expected) in [
            (json!(true), true),
            (json!("yes"), true),
            (json!("Enabled"), true),
            (json!("on"), true),
            (json!(1), true),
            (json!(false), false),
            (json!("no"), false),
            (json!("disabled"), false),
            (json!("OFF"), false),
            (json!("0"), false),
        ] {
            let p: Params = serde_json::from_value(json!({ "reapply": raw })).unwrap();
            assert_eq!(p.reapply, expected, "{raw}");
        }
    }

    #[test]
    fn test_optional_flag() {
        let p: Params = serde_json::from_value(json!({ "reapply": "no" })).unwrap();
        assert_eq!(p.boot_drive, None);
        let p: Params =
            serde_json::from_value(json!({ "reapply": "no", "boot_drive": "yes" })).unwrap();
        assert_eq!(p.boot_drive, Some(true));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let r: Result<Params, _> = serde_json::from_value(json!({ "reapply": "maybe" }));
        assert!(r.is_err());
        let r: Result<Params, _> = serde_json::from_value(json!({ "reapply": 2 }));
        assert!(r.is_err());
    }
}
