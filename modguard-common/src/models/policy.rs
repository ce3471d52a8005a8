// File: modguard-common/src/models/policy.rs

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// The three independent moderation policies.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Spam,
    Length,
    Link,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 3] = [PolicyKind::Spam, PolicyKind::Length, PolicyKind::Link];
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Spam => write!(f, "spam"),
            PolicyKind::Length => write!(f, "length"),
            PolicyKind::Link => write!(f, "link"),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spam" => Ok(PolicyKind::Spam),
            "length" => Ok(PolicyKind::Length),
            "link" => Ok(PolicyKind::Link),
            _ => Err(format!("Unknown policy kind: {}", s)),
        }
    }
}
