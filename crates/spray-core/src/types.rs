//! Shared types used across api-spray.

use crate::error::SprayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a word is combined with a target to form a probe URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Replace every `*` in the target with the word
    #[default]
    Wildcards,
    /// Append the word as a path segment
    Directories,
    /// Prefix the target's domain with the word
    Subdomains,
}

impl ScanMode {
    /// Lowercase name as used in configuration and on the command line.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wildcards => "wildcards",
            Self::Directories => "directories",
            Self::Subdomains => "subdomains",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanMode {
    type Err = SprayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wildcards" => Ok(Self::Wildcards),
            "directories" => Ok(Self::Directories),
            "subdomains" => Ok(Self::Subdomains),
            other => Err(SprayError::Validation(format!(
                "unknown scan mode '{other}': expected wildcards, directories or subdomains"
            ))),
        }
    }
}

/// One (target, word) pair to probe.
///
/// Identity is the pair itself; [`WorkItem::key`] is the form used for
/// completion tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    /// Target as given in the targets file
    pub target: String,
    /// Candidate word from the wordlist
    pub word: String,
}

impl WorkItem {
    /// Separator between target and word in a completion key.
    pub const KEY_SEPARATOR: char = '\0';

    /// Create a work item from a target and a word.
    #[must_use]
    pub fn new(target: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            word: word.into(),
        }
    }

    /// Composite completion key for a target/word pair.
    #[must_use]
    pub fn key_for(target: &str, word: &str) -> String {
        let mut key = String::with_capacity(target.len() + word.len() + 1);
        key.push_str(target);
        key.push(Self::KEY_SEPARATOR);
        key.push_str(word);
        key
    }

    /// Composite completion key for this item.
    #[must_use]
    pub fn key(&self) -> String {
        Self::key_for(&self.target, &self.word)
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}", self.target, self.word)
    }
}
