//! Canonical availability status values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One canonical availability verdict for a schedulable location.
///
/// Serializes as its wire name (`"Yes"`, `"Limited"`, ...). Parsing is
/// case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum StatusValue {
    No,
    Yes,
    Limited,
    Possible,
    Unknown,
    Waitlist,
    Call,
    Email,
    Walkin,
}

/// How a status value may be produced and overwritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    /// `POSSIBLE` / `UNKNOWN`: uncertainty, never overwrites a terminal value
    NonTerminal,
    /// `NO` / `YES` / `LIMITED`: derivable from counting
    Automatic,
    /// `WAITLIST` / `CALL` / `EMAIL` / `WALKIN`: asserted from out-of-band knowledge
    Manual,
}

/// Returned when a string is not a known status name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status value: {0}")]
pub struct ParseStatusError(pub String);

impl StatusValue {
    /// Every status value, in declaration order
    pub const ALL: [StatusValue; 9] = [
        StatusValue::No,
        StatusValue::Yes,
        StatusValue::Limited,
        StatusValue::Possible,
        StatusValue::Unknown,
        StatusValue::Waitlist,
        StatusValue::Call,
        StatusValue::Email,
        StatusValue::Walkin,
    ];

    pub fn category(self) -> StatusCategory {
        match self {
            Self::Possible | Self::Unknown => StatusCategory::NonTerminal,
            Self::No | Self::Yes | Self::Limited => StatusCategory::Automatic,
            Self::Waitlist | Self::Call | Self::Email | Self::Walkin => StatusCategory::Manual,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.category() != StatusCategory::NonTerminal
    }

    pub fn is_manual(self) -> bool {
        self.category() == StatusCategory::Manual
    }

    /// Name used on the wire and in logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::No => "No",
            Self::Yes => "Yes",
            Self::Limited => "Limited",
            Self::Possible => "Possible",
            Self::Unknown => "Unknown",
            Self::Waitlist => "Waitlist",
            Self::Call => "Call",
            Self::Email => "Email",
            Self::Walkin => "Walkin",
        }
    }

    /// Small integer code understood by the status store.
    ///
    /// Code 4 belonged to the legacy "API failed" value and is never produced.
    pub fn code(self) -> u8 {
        match self {
            Self::No => 0,
            Self::Yes => 1,
            Self::Unknown => 2,
            Self::Possible => 3,
            Self::Waitlist => 5,
            Self::Call => 6,
            Self::Email => 7,
            Self::Walkin => 8,
            Self::Limited => 9,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusValue {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        let status = match folded.as_str() {
            "no" => Self::No,
            "yes" => Self::Yes,
            "limited" => Self::Limited,
            "possible" => Self::Possible,
            "unknown" => Self::Unknown,
            "waitlist" => Self::Waitlist,
            "call" => Self::Call,
            "email" => Self::Email,
            "walkin" => Self::Walkin,
            _ => return Err(ParseStatusError(s.to_string())),
        };
        Ok(status)
    }
}

impl From<StatusValue> for &'static str {
    fn from(status: StatusValue) -> Self {
        status.as_str()
    }
}

impl TryFrom<String> for StatusValue {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
