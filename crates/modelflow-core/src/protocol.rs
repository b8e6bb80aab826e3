//! Protocol version gate for persisted documents.
//!
//! Every serialized document carries a `protocol_version` of the form
//! `<name>-<major>.<minor>.<revision>`. Each document kind declares its own
//! supported `[MIN, MAX]` window and rejects anything outside it.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ProtocolVersionError;

/// A parsed protocol version identifier.
///
/// Ordering compares the protocol name first and then the numeric components,
/// so versions of unrelated protocols never interleave.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolVersion {
    name: Cow<'static, str>,
    major: u32,
    minor: u32,
    revision: u32,
}

impl ProtocolVersion {
    /// Build a version from a static protocol name. Usable in `const` items.
    pub const fn from_static(name: &'static str, major: u32, minor: u32, revision: u32) -> Self {
        Self {
            name: Cow::Borrowed(name),
            major,
            minor,
            revision,
        }
    }

    /// Parse `<name>-<major>.<minor>.<revision>`.
    ///
    /// The name may itself contain `-`; the numeric part is everything after
    /// the last one. Components may not carry leading zeros, so the parsed
    /// value displays back as exactly `input`.
    pub fn parse(input: &str) -> Result<Self, ProtocolVersionError> {
        let invalid = |reason: &str| ProtocolVersionError::InvalidFormat {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (name, numbers) = input
            .rsplit_once('-')
            .ok_or_else(|| invalid("expected <name>-<major>.<minor>.<revision>"))?;
        if name.is_empty() {
            return Err(invalid("protocol name is empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid("protocol name contains whitespace"));
        }

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid("expected exactly three numeric components"));
        }

        let mut components = [0u32; 3];
        for (slot, part) in components.iter_mut().zip(&parts) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid("version components must be non-negative integers"));
            }
            if part.len() > 1 && part.starts_with('0') {
                return Err(invalid("version components may not have leading zeros"));
            }
            *slot = part
                .parse::<u32>()
                .map_err(|_| invalid("version component is out of range"))?;
        }

        Ok(Self {
            name: Cow::Owned(name.to_string()),
            major: components[0],
            minor: components[1],
            revision: components[2],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Check that `self` lies within `[min, max]` and belongs to the same protocol.
    ///
    /// # Errors
    ///
    /// `ProtocolVersionError::Unsupported` when the protocol name differs or
    /// the version falls outside the window.
    pub fn validate(
        &self,
        min: &ProtocolVersion,
        max: &ProtocolVersion,
    ) -> Result<(), ProtocolVersionError> {
        let same_protocol = self.name == min.name && self.name == max.name;
        if !same_protocol || self < min || self > max {
            return Err(ProtocolVersionError::Unsupported {
                found: self.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        Ok(())
    }
}

impl Ord for ProtocolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| {
                (self.major, self.minor, self.revision).cmp(&(
                    other.major,
                    other.minor,
                    other.revision,
                ))
            })
    }
}

impl PartialOrd for ProtocolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}.{}.{}",
            self.name, self.major, self.minor, self.revision
        )
    }
}

impl FromStr for ProtocolVersion {
    type Err = ProtocolVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
