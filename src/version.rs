//! Fixed-width migration versions.
//!
//! A version is exactly four ASCII digits (`0000`..`9999`). Because every
//! version has the same width, ordering the strings lexicographically gives
//! the same answer as ordering them numerically, which is what `Ord` relies on.

use std::fmt;
use std::str::FromStr;

use crate::error::{MigrantError, Result};

/// Number of characters in every version.
pub const VERSION_WIDTH: usize = 4;

/// A validated 4-digit, zero-padded migration version such as `0007`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(String);

impl Version {
    /// Validate `raw` as a version. `file` names the source for the error message.
    pub fn parse_for(raw: &str, file: &str) -> Result<Self> {
        if raw.len() != VERSION_WIDTH {
            return Err(MigrantError::InvalidVersionFormat {
                file: file.to_string(),
                reason: format!("version must be {} characters long: {}", VERSION_WIDTH, raw),
            });
        }
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MigrantError::InvalidVersionFormat {
                file: file.to_string(),
                reason: format!("version must be numeric: {}", raw),
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// The first version handed out when a migration directory is empty.
    pub fn initial() -> Self {
        Self("0000".to_string())
    }

    pub fn from_number(n: u32) -> Result<Self> {
        if n > 9999 {
            return Err(MigrantError::VersionOverflow(n.to_string()));
        }
        Ok(Self(format!("{:04}", n)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn number(&self) -> u32 {
        // Validated as 4 ASCII digits on construction.
        self.0
            .bytes()
            .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
    }

    /// The version immediately after this one.
    pub fn next(&self) -> Result<Self> {
        if self.number() == 9999 {
            return Err(MigrantError::VersionOverflow(self.0.clone()));
        }
        Self::from_number(self.number() + 1)
    }

    /// True when `other` directly follows `self`.
    pub fn is_followed_by(&self, other: &Version) -> bool {
        self.number() + 1 == other.number()
    }
}

impl FromStr for Version {
    type Err = MigrantError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_for(s, s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
