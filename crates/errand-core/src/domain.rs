//! Capability domains.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A capability area backed by exactly one worker type.
///
/// Each user request fans out to at most one worker process per domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Electronic mail (send, draft).
    Mail,
    /// Calendar (events).
    Calendar,
    /// File storage (search, metadata, sharing).
    Storage,
}

impl Domain {
    /// All domains the system knows about.
    pub const ALL: [Domain; 3] = [Domain::Mail, Domain::Calendar, Domain::Storage];

    /// The delegated OAuth scopes a worker for this domain requires.
    pub fn required_scopes(&self) -> &'static [&'static str] {
        match self {
            Domain::Mail => &["https://www.googleapis.com/auth/gmail.compose"],
            Domain::Calendar => &["https://www.googleapis.com/auth/calendar"],
            Domain::Storage => &["https://www.googleapis.com/auth/drive"],
        }
    }

    /// Stable name used on the command line and in tool name prefixes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Mail => "mail",
            Domain::Calendar => "calendar",
            Domain::Storage => "storage",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown domain name.
#[derive(Debug, Error)]
#[error("Unknown domain: {0}")]
pub struct UnknownDomain(pub String);

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mail" => Ok(Domain::Mail),
            "calendar" => Ok(Domain::Calendar),
            "storage" => Ok(Domain::Storage),
            other => Err(UnknownDomain(other.to_owned())),
        }
    }
}
