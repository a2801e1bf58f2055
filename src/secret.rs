//! Secret text that never leaks through formatting.

use serde::{Deserialize, Deserializer, de};
use serde_json::Value;
use std::fmt;
use zeroize::Zeroize;

const REDACTED: &str = "********";

/// A passphrase or similar value. `Debug` and `Display` print a fixed mask and
/// the buffer is wiped on drop; the value is only reachable through [`expose`].
///
/// [`expose`]: SensitiveString::expose
#[derive(Clone, PartialEq, Eq)]
pub struct SensitiveString(String);

impl SensitiveString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Masks every occurrence of the value in `text`.
    pub fn redact(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(self.0.as_str(), REDACTED)
    }
}

impl Drop for SensitiveString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Numbers are accepted as text; the rejected value is never echoed.
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(SensitiveString(s)),
            Value::Number(n) => Ok(SensitiveString(n.to_string())),
            _ => Err(de::Error::custom("expected a string or a number")),
        }
    }
}
