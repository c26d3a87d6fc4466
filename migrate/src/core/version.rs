//! Dotted numeric versions and their total order.
//!
//! Versions compare component-wise with missing trailing components treated as
//! zero, so `1.5` and `1.5.0` are equal. The text as written is kept for display
//! and for naming step entry points.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// A parsed dotted numeric version (`1.5.3` -> `(1, 5, 3)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    parts: Vec<u64>,
}

impl Version {
    /// Parse `digits(.digits)*`, rejecting anything else.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(anyhow!("empty version"));
        }
        let mut parts = Vec::new();
        for component in raw.split('.') {
            if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
                return Err(anyhow!("invalid version '{raw}': component '{component}' is not numeric"));
            }
            let value = component
                .parse::<u64>()
                .map_err(|err| anyhow!("invalid version '{raw}': {err}"))?;
            parts.push(value);
        }
        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    /// Parse permissively: each component counts as its leading digits, or
    /// zero when it has none (`1.2-beta` -> `(1, 2)`, `1.x` -> `(1, 0)`).
    pub fn lenient(raw: &str) -> Self {
        let raw = raw.trim();
        let parts = raw.split('.').map(leading_number).collect();
        Self {
            raw: raw.to_string(),
            parts,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// The version text with `.` replaced by `_` (`1.5.3` -> `1_5_3`).
    pub fn underscored(&self) -> String {
        self.raw.replace('.', "_")
    }

    /// Components without insignificant trailing zeros.
    fn significant(&self) -> &[u64] {
        let len = self
            .parts
            .iter()
            .rposition(|part| *part != 0)
            .map_or(0, |idx| idx + 1);
        &self.parts[..len]
    }
}

fn leading_number(component: &str) -> u64 {
    let component = component.trim();
    let end = component
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(component.len());
    component[..end].parse().unwrap_or(0)
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for idx in 0..len {
            let left = self.parts.get(idx).copied().unwrap_or(0);
            let right = other.parts.get(idx).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.raw
    }
}

/// Compare two raw version strings without failing on malformed input.
///
/// Non-numeric components are treated as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    Version::lenient(a).cmp(&Version::lenient(b))
}
